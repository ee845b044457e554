//! QuerySync Core - Domain types and key codec
//!
//! This crate provides the foundational types shared by every QuerySync
//! crate: deterministic query keys, key filters for invalidation, the
//! error taxonomy, and the page/toggle payloads exchanged with the server.

pub mod error;
pub mod identity;
pub mod key;
pub mod types;

pub use error::{QueryError, Result};
pub use identity::{IdentitySource, StaticIdentity, ViewerId};
pub use key::{KeyFilter, KeyParams, KeySegment, QueryKey, build_key, build_key_from, matches};
pub use types::{FeedPage, PageResponse, ServerToggle, Tagged, ToggleState};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
