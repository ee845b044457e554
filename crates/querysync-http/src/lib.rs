//! QuerySync HTTP - API adapter
//!
//! Connects feeds and toggles to a JSON API:
//!
//! - [`HttpClient`]: the transport seam, implemented by [`ReqwestClient`]
//! - [`PagedEndpoint`]: a [`PageLoader`](querysync_feed::PageLoader) for
//!   paginated list endpoints
//! - [`ToggleEndpoint`]: `POST`/`DELETE` relationship endpoints
//!
//! HTTP failures convert into [`QueryError`](querysync_core::QueryError):
//! `408`, `429`, `5xx` and transport errors are transient, other `4xx`
//! statuses are validation failures.

pub mod client;
pub mod endpoint;
pub mod error;

pub use client::{DEFAULT_TIMEOUT, HttpClient, HttpRequest, HttpResponse, ReqwestClient, ReqwestClientConfig};
pub use endpoint::{DEFAULT_PAGE_SIZE, PagedEndpoint, SIZE_PARAM, ToggleEndpoint};
pub use error::HttpError;
pub use reqwest::Method;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
