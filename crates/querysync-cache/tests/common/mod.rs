#![allow(dead_code)]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use querysync_cache::{CacheEvent, CacheEventKind, CacheStore, Producer, Subscription};
use querysync_core::{QueryError, QueryKey};
use serde_json::json;

/// Counts producer invocations and returns the running count as data.
#[derive(Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Producer resolving to `{"call": n}`.
    pub fn producer(&self) -> Producer {
        let calls = Arc::clone(&self.calls);
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, QueryError>(json!({ "call": n })) }.boxed()
        })
    }
}

/// Records the kinds of events delivered for one key.
pub struct EventLog {
    events: Arc<Mutex<Vec<CacheEventKind>>>,
    _subscription: Subscription,
}

impl EventLog {
    pub fn attach(store: &CacheStore, key: &QueryKey) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = store.subscribe(key, move |event: &CacheEvent| sink.lock().push(event.kind));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn kinds(&self) -> Vec<CacheEventKind> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: CacheEventKind) -> usize {
        self.events.lock().iter().filter(|k| **k == kind).count()
    }
}

/// Key of a user's post feed.
pub fn user_posts(user: i64, kind: &str) -> QueryKey {
    QueryKey::new("userPosts").with(user).with(kind)
}

/// Yields until no fetch is running for `key`.
pub async fn settle(fetcher: &querysync_cache::Fetcher, key: &QueryKey) {
    tokio::task::yield_now().await;
    while fetcher.is_fetching(key) {
        tokio::task::yield_now().await;
    }
}
