//! QuerySync Cache - Client-side query cache
//!
//! This crate provides the synchronization layer: a subscriber-aware cache
//! store, a deduplicating retrying fetcher, optimistic mutations with
//! rollback, and predicate-based invalidation, all owned by an explicitly
//! constructed [`QueryClient`].

pub mod client;
pub mod config;
pub mod fetcher;
pub mod gc;
pub mod invalidation;
pub mod metrics;
pub mod mutation;
pub mod store;

pub use client::{Producer, QueryClient, QueryObserver};
pub use config::{CacheConfig, QueryOptions, RetryPolicy};
pub use fetcher::Fetcher;
pub use gc::{GcHandle, GcScheduler};
pub use invalidation::{InvalidationResult, InvalidationRouter};
pub use crate::metrics::{CacheMetrics, register_cache_metrics};
pub use mutation::{MutationConfig, MutationExecutor, MutationStatus, PendingMutation};
pub use store::{
    CacheEntry, CacheEvent, CacheEventKind, CacheStore, Listener, QueryStatus, Subscription,
};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
