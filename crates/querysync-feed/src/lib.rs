//! QuerySync Feed - Paginated feeds and relationship toggles
//!
//! This crate builds the two user-facing state machines on top of the query
//! cache:
//!
//! - [`PaginatedFeed`]: accumulates contiguous server pages for one set of
//!   base parameters, with client-side tag filtering over what is loaded
//! - [`ToggleCoordinator`]: optimistic archive/follow style toggles that
//!   reconcile against the server's authoritative count
//!
//! Pages come from a [`PageLoader`], which hides the transport.

pub mod feed;
pub mod loader;
pub mod toggle;
pub mod window;

pub use feed::{FeedState, LoadOutcome, PAGE_PARAM, PaginatedFeed};
pub use loader::{FeedItem, PageLoader};
pub use toggle::{ToggleCoordinator, ToggleOutcome};
pub use window::FeedWindow;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }
}
