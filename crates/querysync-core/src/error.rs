//! Error types for QuerySync.
//!
//! A single error hierarchy is shared by the cache, the feed and the HTTP
//! adapter. Errors are `Clone` because one in-flight fetch result is handed
//! to every caller that joined it.
//!
//! # Error Taxonomy
//!
//! - `Network`: transient failure, retried by the fetcher up to its policy
//! - `Validation`: the server rejected the request; never retried
//! - `StaleGeneration`: a feed result arrived for parameters that were
//!   replaced in the meantime; dropped silently by the feed
//!
//! # Example
//!
//! ```
//! use querysync_core::{QueryError, Result};
//!
//! fn load(page: u32) -> Result<u32> {
//!     if page > 10 {
//!         return Err(QueryError::validation("page out of range"));
//!     }
//!     Ok(page)
//! }
//!
//! let err = load(42).unwrap_err();
//! assert!(err.is_validation());
//! assert!(!err.is_transient());
//! ```

use thiserror::Error;

/// Main error type for QuerySync operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The request did not reach the server or the server failed transiently.
    #[error("network failure{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Network {
        /// Description of the failure
        message: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
    },

    /// The server rejected the request.
    #[error("validation failure{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Validation {
        /// Description of the rejection
        message: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
    },

    /// A result was produced for an abandoned feed generation.
    #[error("stale generation {generation} discarded (current is {current})")]
    StaleGeneration {
        /// Generation captured when the request started
        generation: u64,
        /// Generation of the feed when the result arrived
        current: u64,
    },

    /// A payload could not be decoded or encoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A page would break the contiguous page sequence.
    #[error("page {actual} is out of order, expected page {expected}")]
    PageOutOfOrder {
        /// The page number the window can accept
        expected: u32,
        /// The page number that was received
        actual: u32,
    },

    /// Another operation on the same key is still pending.
    #[error("operation already pending for '{key}'")]
    Busy {
        /// Display form of the busy key
        key: String,
    },

    /// The owning client was disposed.
    #[error("query client has been disposed")]
    Disposed,

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    // ============================================
    // Convenience constructors
    // ============================================

    /// Creates a Network error without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a Network error for an HTTP status.
    pub fn network_status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Creates a Validation error without a status code.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a Validation error for an HTTP status.
    pub fn validation_status(status: u16, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Creates a Decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates a Busy error for the given key.
    pub fn busy(key: impl ToString) -> Self {
        Self::Busy {
            key: key.to_string(),
        }
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================
    // Query methods
    // ============================================

    /// Returns true if a retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns true if the server rejected the request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true if this is an abandoned-generation discard.
    pub fn is_stale_generation(&self) -> bool {
        matches!(self, Self::StaleGeneration { .. })
    }

    /// Returns true if a pending operation blocked this one.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Returns the HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } | Self::Validation { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Type alias for Results with QueryError.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_display_with_status() {
        let error = QueryError::network_status(503, "service unavailable");
        let msg = error.to_string();

        assert!(msg.contains("503"));
        assert!(msg.contains("service unavailable"));
    }

    #[test]
    fn test_validation_display_without_status() {
        let error = QueryError::validation("already archived");
        assert_eq!(error.to_string(), "validation failure: already archived");
    }

    #[test]
    fn test_is_transient() {
        assert!(QueryError::network("timeout").is_transient());
        assert!(!QueryError::validation("bad").is_transient());
        assert!(!QueryError::decode("eof").is_transient());
        assert!(!QueryError::Disposed.is_transient());
    }

    #[test]
    fn test_stale_generation() {
        let error = QueryError::StaleGeneration {
            generation: 1,
            current: 2,
        };
        assert!(error.is_stale_generation());
        assert!(error.to_string().contains("current is 2"));
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(QueryError::validation_status(422, "x").status(), Some(422));
        assert_eq!(QueryError::network("x").status(), None);
        assert_eq!(QueryError::internal("x").status(), None);
    }

    #[test]
    fn test_serde_error_conversion() {
        let err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let query_error: QueryError = err.into();
        assert!(matches!(query_error, QueryError::Decode(_)));
    }

    #[test]
    fn test_result_with_question_mark() {
        fn inner() -> Result<()> {
            Err(QueryError::busy("archive:7"))
        }

        fn outer() -> Result<String> {
            inner()?;
            Ok("success".into())
        }

        let err = outer().unwrap_err();
        assert!(err.is_busy());
    }
}
