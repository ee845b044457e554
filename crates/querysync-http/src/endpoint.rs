//! Feed and toggle endpoints over an [`HttpClient`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use querysync_core::{FeedPage, KeyParams, PageResponse, Result, ServerToggle};
use querysync_feed::{FeedItem, PAGE_PARAM, PageLoader};
use tracing::debug;

use crate::client::{HttpClient, HttpRequest};

/// Query parameter carrying the page size.
pub const SIZE_PARAM: &str = "size";

/// Page size used when the base parameters do not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Paginated list endpoint.
///
/// Issues `GET path?<base params>&page=N&size=S` and decodes the
/// `{content, number, last, totalElements}` body into a [`FeedPage`].
pub struct PagedEndpoint<T> {
    client: Arc<dyn HttpClient>,
    path: String,
    page_size: u32,
    _item: PhantomData<fn() -> T>,
}

impl<T> PagedEndpoint<T> {
    /// Creates an endpoint for `path`.
    pub fn new(client: Arc<dyn HttpClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            page_size: DEFAULT_PAGE_SIZE,
            _item: PhantomData,
        }
    }

    /// Sets the page size sent when the base parameters carry none.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the endpoint path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Builds the request for one page.
    pub fn request(&self, params: &KeyParams, page: u32) -> HttpRequest {
        let mut params = params.clone();
        params.remove(PAGE_PARAM);
        let request = HttpRequest::get(&self.path).params(&params).param(PAGE_PARAM, page);
        if request.has_param(SIZE_PARAM) {
            request
        } else {
            request.param(SIZE_PARAM, self.page_size)
        }
    }
}

#[async_trait]
impl<T: FeedItem> PageLoader<T> for PagedEndpoint<T> {
    async fn load_page(&self, params: &KeyParams, page: u32) -> Result<FeedPage<T>> {
        let response = self.client.request(self.request(params, page)).await?;
        let body: PageResponse<T> = response.decode()?;
        debug!(path = %self.path, page, items = body.content.len(), last = body.last, "Page decoded");
        Ok(body.into())
    }

    fn name(&self) -> &str {
        &self.path
    }
}

impl<T> fmt::Debug for PagedEndpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedEndpoint")
            .field("client", &self.client.name())
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Relationship endpoint: `POST` activates, `DELETE` deactivates.
///
/// Both answer with the authoritative `{isActive, count}`.
#[derive(Clone)]
pub struct ToggleEndpoint {
    client: Arc<dyn HttpClient>,
    path: String,
}

impl ToggleEndpoint {
    /// Creates an endpoint for `path`, e.g. `/posts/7/archive`.
    pub fn new(client: Arc<dyn HttpClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    /// Returns the endpoint path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Builds the request that moves the relationship to `active`.
    pub fn request(&self, active: bool) -> HttpRequest {
        if active {
            HttpRequest::post(&self.path)
        } else {
            HttpRequest::delete(&self.path)
        }
    }

    /// Moves the relationship to `active` and returns the server's state.
    pub async fn set(&self, active: bool) -> Result<ServerToggle> {
        let response = self.client.request(self.request(active)).await?;
        let state: ServerToggle = response.decode()?;
        debug!(path = %self.path, active, is_active = state.is_active, count = state.count, "Toggle acknowledged");
        Ok(state)
    }
}

impl fmt::Debug for ToggleEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleEndpoint")
            .field("client", &self.client.name())
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use querysync_core::QueryError;
    use reqwest::Method;
    use serde_json::{Value, json};

    use super::*;
    use crate::client::HttpResponse;
    use crate::error::HttpError;

    /// Answers every request with one canned response.
    struct CannedClient {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl CannedClient {
        fn new(status: u16, data: Value) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse::new(status, data),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn request(&self, request: HttpRequest) -> std::result::Result<HttpResponse, HttpError> {
            self.seen.lock().push(request);
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_page_request_shape() {
        let endpoint: PagedEndpoint<Value> = PagedEndpoint::new(CannedClient::new(200, Value::Null), "/posts").page_size(20);

        let request = endpoint.request(&KeyParams::new().with("userId", 3).with("page", 9), 1);
        assert_eq!(
            request.query,
            vec![
                ("userId".to_string(), "3".to_string()),
                ("page".to_string(), "1".to_string()),
                ("size".to_string(), "20".to_string()),
            ]
        );

        let sized = endpoint.request(&KeyParams::new().with("size", 5), 0);
        assert_eq!(sized.query.iter().filter(|(k, _)| k == "size").count(), 1);
    }

    #[tokio::test]
    async fn test_load_page_decodes_body() {
        let client = CannedClient::new(
            200,
            json!({"content": [{"id": 1}], "number": 2, "last": true, "totalElements": 25}),
        );
        let endpoint: PagedEndpoint<Value> = PagedEndpoint::new(client.clone(), "/posts");

        let page = endpoint.load_page(&KeyParams::new(), 2).await.unwrap();

        assert_eq!(page.items, vec![json!({"id": 1})]);
        assert_eq!(page.page_number, 2);
        assert!(page.is_last);
        assert_eq!(page.total_elements, 25);
        assert_eq!(client.seen.lock()[0].method, Method::GET);
    }

    #[tokio::test]
    async fn test_load_page_maps_statuses() {
        let unavailable: PagedEndpoint<Value> = PagedEndpoint::new(CannedClient::new(503, Value::Null), "/posts");
        assert!(unavailable.load_page(&KeyParams::new(), 0).await.unwrap_err().is_transient());

        let malformed: PagedEndpoint<Value> = PagedEndpoint::new(CannedClient::new(200, json!({"items": []})), "/posts");
        assert!(matches!(
            malformed.load_page(&KeyParams::new(), 0).await.unwrap_err(),
            QueryError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_toggle_methods() {
        let client = CannedClient::new(200, json!({"isActive": true, "count": 8}));
        let endpoint = ToggleEndpoint::new(client.clone(), "/users/4/follow");

        assert_eq!(endpoint.set(true).await.unwrap(), ServerToggle::new(true, 8));
        endpoint.set(false).await.unwrap();

        let methods: Vec<Method> = client.seen.lock().iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::POST, Method::DELETE]);
    }

    #[tokio::test]
    async fn test_rejected_toggle_is_validation() {
        let endpoint = ToggleEndpoint::new(CannedClient::new(409, json!({"message": "already following"})), "/f");

        let err = endpoint.set(true).await.unwrap_err();
        assert_eq!(err, QueryError::validation_status(409, "already following"));
    }
}
