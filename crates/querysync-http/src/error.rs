//! Error types for the HTTP adapter.

use querysync_core::QueryError;
use thiserror::Error;

/// Errors raised while talking to the API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("server returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The base URL or a path could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The response body is not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl HttpError {
    /// Creates a Status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the request may succeed when repeated.
    ///
    /// Transport failures, timeouts, `408`, `429` and `5xx` are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Transport(_) | Self::Timeout => true,
            Self::InvalidUrl(_) | Self::Decode(_) => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<HttpError> for QueryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, message } if is_transient_status(status) => {
                QueryError::network_status(status, message)
            },
            HttpError::Status { status, message } => QueryError::validation_status(status, message),
            HttpError::Transport(message) => QueryError::network(message),
            HttpError::Timeout => QueryError::network("request timed out"),
            HttpError::InvalidUrl(message) => QueryError::internal(format!("invalid url: {message}")),
            HttpError::Decode(message) => QueryError::decode(message),
        }
    }
}
