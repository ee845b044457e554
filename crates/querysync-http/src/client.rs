//! HTTP client abstraction and its reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use querysync_core::{IdentitySource, KeyParams, KeySegment, ViewerId};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One API request.
///
/// # Example
///
/// ```
/// use querysync_http::{HttpRequest, Method};
///
/// let request = HttpRequest::get("/posts").param("page", 2).param("size", 12);
/// assert_eq!(request.method, Method::GET);
/// assert_eq!(request.query, vec![("page".into(), "2".into()), ("size".into(), "12".into())]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Path relative to the client's base URL
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Creates a request without parameters or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends a query parameter. Null values are skipped.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<KeySegment>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.query.push((name.into(), value.to_string()));
        }
        self
    }

    /// Appends every parameter of a record.
    pub fn params(mut self, params: &KeyParams) -> Self {
        self.query.extend(params.to_query_pairs());
        self
    }

    /// Returns true if a query parameter named `name` is set.
    pub fn has_param(&self, name: &str) -> bool {
        self.query.iter().any(|(k, _)| k == name)
    }

    /// Sets the JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body, `Null` when empty
    pub data: Value,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    /// Creates a `200 OK` response.
    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }

    /// Returns true for `2xx` statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body of a successful response.
    ///
    /// Other statuses become [`HttpError::Status`], with the body's
    /// `message` field (or the whole body) as message.
    pub fn into_result(self) -> Result<Value, HttpError> {
        if self.is_success() {
            return Ok(self.data);
        }
        let message = match self.data.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None if self.data.is_null() => String::new(),
            None => self.data.to_string(),
        };
        Err(HttpError::status(self.status, message))
    }

    /// Decodes the body of a successful response.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        Ok(serde_json::from_value(self.into_result()?)?)
    }
}

/// Transport used by endpoints.
///
/// Implementations send one request and report the status and JSON body;
/// interpreting the status is left to the caller.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// Only failures to obtain a response: transport errors, timeouts, and
    /// bodies that are not JSON. Non-success statuses are returned as
    /// responses.
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;

    /// Sends a GET request and returns the body of a successful response.
    async fn get_json(&self, path: &str, params: &KeyParams) -> Result<Value, HttpError> {
        self.request(HttpRequest::get(path).params(params))
            .await?
            .into_result()
    }

    /// Returns the name of this client, used for logging.
    fn name(&self) -> &str {
        "http"
    }
}

/// Configuration of a [`ReqwestClient`].
#[derive(Debug, Clone)]
pub struct ReqwestClientConfig {
    /// Base URL every request path is resolved against
    pub base_url: String,
    /// Timeout of a whole request
    pub timeout: Duration,
    /// Parameters added to every request before its own
    pub default_params: KeyParams,
}

impl ReqwestClientConfig {
    /// Creates a config for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            default_params: KeyParams::new(),
        }
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a parameter sent with every request.
    pub fn default_param(mut self, name: impl Into<String>, value: impl Into<KeySegment>) -> Self {
        self.default_params.insert(name, value);
        self
    }

    /// Sends the viewer id of `identity` with every request, if known.
    pub fn identity(mut self, identity: &dyn IdentitySource) -> Self {
        if let Some(viewer) = identity.viewer_id() {
            self.default_params.insert(ViewerId::PARAM, viewer.into_inner());
        }
        self
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base: Url,
    default_params: KeyParams,
}

impl ReqwestClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] if the base URL does not parse.
    pub fn new(config: ReqwestClientConfig) -> Result<Self, HttpError> {
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("querysync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            default_params: config.default_params,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolves the URL of a request, query included.
    pub fn url(&self, request: &HttpRequest) -> Result<Url, HttpError> {
        let mut url = self.base.join(request.path.trim_start_matches('/'))?;
        let defaults = self.default_params.to_query_pairs();
        if !defaults.is_empty() || !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in defaults.iter().chain(request.query.iter()) {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = self.url(&request)?;
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self.client.request(request.method, url);
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let data = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(data) => data,
                // Error pages are often plain text; keep them as the message.
                Err(_) if !(200..300).contains(&status) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => return Err(e.into()),
            }
        };
        debug!(status, "Response received");
        Ok(HttpResponse { status, data })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use querysync_core::StaticIdentity;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_params_skip_nulls() {
        let request = HttpRequest::get("/posts")
            .params(&KeyParams::new().with("tag", "ink").with("userId", 7))
            .param("viewer", Option::<i64>::None);

        assert!(request.has_param("tag"));
        assert!(request.has_param("userId"));
        assert!(!request.has_param("viewer"));
    }

    #[test]
    fn test_into_result_extracts_message() {
        let err = HttpResponse::new(409, json!({"message": "already archived"}))
            .into_result()
            .unwrap_err();
        assert_eq!(err, HttpError::status(409, "already archived"));

        let err = HttpResponse::new(502, Value::Null).into_result().unwrap_err();
        assert_eq!(err, HttpError::status(502, ""));

        assert_eq!(HttpResponse::ok(json!([1])).into_result().unwrap(), json!([1]));
    }

    #[test]
    fn test_url_joins_base_defaults_and_query() {
        let config = ReqwestClientConfig::new("https://api.example.com/v1")
            .identity(&StaticIdentity::new(42))
            .default_param("lang", "es");
        let client = ReqwestClient::new(config).unwrap();

        let url = client
            .url(&HttpRequest::get("/posts/user").param("page", 0))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/posts/user?lang=es&viewerId=42&page=0"
        );
    }

    #[test]
    fn test_anonymous_identity_adds_nothing() {
        let config = ReqwestClientConfig::new("https://api.example.com").identity(&StaticIdentity::anonymous());
        let client = ReqwestClient::new(config).unwrap();

        let url = client.url(&HttpRequest::get("tags")).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/tags");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ReqwestClient::new(ReqwestClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl(_)));
    }
}
