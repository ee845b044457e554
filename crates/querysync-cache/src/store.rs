//! In-memory query cache with subscriber notification.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use querysync_core::{KeyFilter, QueryError, QueryKey, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{CacheConfig, QueryOptions};
use crate::metrics::CacheMetrics;

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    /// Data is present.
    Success,
    /// The last fetch failed. Previous data, if any, is kept.
    Error,
}

/// Snapshot of one cached query.
///
/// Entries returned by the store are copies; mutating them has no effect on
/// the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Last known data.
    pub data: Option<Value>,
    /// Fetch status.
    pub status: QueryStatus,
    /// Error of the last failed fetch.
    pub error: Option<QueryError>,
    /// When the data was last written by a fetch.
    pub fetched_at: Option<Instant>,
    /// Age after which the data is stale.
    pub stale_after: Duration,
    /// Unobserved time after which the entry is collected.
    pub collect_after: Duration,
    /// Number of live subscriptions.
    pub subscriber_count: usize,
    /// True while a fetch for this key is running.
    pub is_fetching: bool,
    /// True once the entry was invalidated and not refetched since.
    pub invalidated: bool,
    unobserved_since: Instant,
}

impl CacheEntry {
    fn new(stale_after: Duration, collect_after: Duration) -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            fetched_at: None,
            stale_after,
            collect_after,
            subscriber_count: 0,
            is_fetching: false,
            invalidated: false,
            unobserved_since: Instant::now(),
        }
    }

    /// Returns true if the entry holds data.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Returns true if the data should be refetched before it is trusted.
    ///
    /// Stale data is still served.
    pub fn is_stale(&self) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fetched_at {
            Some(fetched_at) => fetched_at.elapsed() >= self.stale_after,
            None => true,
        }
    }

    /// Returns the age of the data.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    fn is_collectable(&self, now: Instant) -> bool {
        self.subscriber_count == 0
            && !self.is_fetching
            && now.saturating_duration_since(self.unobserved_since) >= self.collect_after
    }
}

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    /// New data was written.
    Updated,
    /// A fetch failed; data was kept.
    Errored,
    /// The entry was marked stale.
    Invalidated,
    /// The entry was removed.
    Removed,
}

/// Notification delivered to the subscribers of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    /// Key of the entry that changed.
    pub key: QueryKey,
    /// Kind of change.
    pub kind: CacheEventKind,
}

/// Callback invoked on cache events.
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct EntrySlot {
    entry: CacheEntry,
    listeners: Vec<(u64, Listener)>,
}

impl EntrySlot {
    fn listeners(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

struct StoreInner {
    entries: Mutex<HashMap<QueryKey, EntrySlot>>,
    /// Serializes mutate-then-notify so that notifications for a key arrive
    /// in call order. Reentrant so listeners may write back into the store.
    write_gate: ReentrantMutex<()>,
    config: CacheConfig,
    metrics: CacheMetrics,
    next_listener_id: AtomicU64,
}

impl StoreInner {
    fn slot_mut<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, EntrySlot>,
        key: &QueryKey,
    ) -> &'a mut EntrySlot {
        entries.entry(key.clone()).or_insert_with(|| EntrySlot {
            entry: CacheEntry::new(self.config.stale_time, self.config.gc_time),
            listeners: Vec::new(),
        })
    }

    fn notify(&self, key: &QueryKey, kind: CacheEventKind, listeners: Vec<Listener>) {
        if listeners.is_empty() {
            return;
        }
        let event = CacheEvent {
            key: key.clone(),
            kind,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    fn unsubscribe(&self, key: &QueryKey, id: u64) {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get_mut(key) {
            slot.listeners.retain(|(listener_id, _)| *listener_id != id);
            slot.entry.subscriber_count = slot.listeners.len();
            if slot.entry.subscriber_count == 0 {
                slot.entry.unobserved_since = Instant::now();
            }
        }
    }
}

/// Shared in-memory query cache.
///
/// `CacheStore` is a cheap handle; clones share the same entries. Every
/// write goes through one of its methods, and subscribers of the written key
/// are notified synchronously once the write is visible.
///
/// # Examples
///
/// ```
/// use querysync_cache::{CacheConfig, CacheStore, QueryStatus};
/// use querysync_core::QueryKey;
/// use serde_json::json;
///
/// let store = CacheStore::new(CacheConfig::default());
/// let key = QueryKey::new("userPosts").with(7);
///
/// store.set(&key, json!(["a", "b"]));
///
/// let entry = store.get(&key).unwrap();
/// assert_eq!(entry.status, QueryStatus::Success);
/// assert_eq!(entry.data, Some(json!(["a", "b"])));
/// ```
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl CacheStore {
    /// Crea un nuevo store con la configuracion dada.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_metrics(config, CacheMetrics::new())
    }

    /// Creates a store recording into the given metrics.
    pub fn with_metrics(config: CacheConfig, metrics: CacheMetrics) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
                write_gate: ReentrantMutex::new(()),
                config,
                metrics,
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the metrics recorder.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    /// Returns a copy of the entry for `key`, recording a hit or a miss.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        let entry = self.peek(key);
        if entry.as_ref().is_some_and(CacheEntry::has_data) {
            self.inner.metrics.record_hit();
        } else {
            self.inner.metrics.record_miss();
        }
        entry
    }

    /// Returns a copy of the entry without touching metrics.
    pub fn peek(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|slot| slot.entry.clone())
    }

    /// Returns the data for `key` decoded as `T`.
    pub fn get_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>> {
        match self.peek(key).and_then(|entry| entry.data) {
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    /// Writes fetched data, marking the entry fresh.
    pub fn set(&self, key: &QueryKey, data: Value) {
        let _gate = self.inner.write_gate.lock();
        let listeners = {
            let mut entries = self.inner.entries.lock();
            let slot = self.inner.slot_mut(&mut entries, key);
            let entry = &mut slot.entry;
            entry.data = Some(data);
            entry.status = QueryStatus::Success;
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
            entry.invalidated = false;
            entry.is_fetching = false;
            if entry.subscriber_count == 0 {
                entry.unobserved_since = Instant::now();
            }
            let listeners = slot.listeners();
            self.inner.metrics.update_entry_count(entries.len());
            listeners
        };
        self.inner.notify(key, CacheEventKind::Updated, listeners);
    }

    /// Serializes `data` and writes it.
    pub fn set_data<T: Serialize + ?Sized>(&self, key: &QueryKey, data: &T) -> Result<()> {
        self.set(key, serde_json::to_value(data)?);
        Ok(())
    }

    /// Records a failed fetch. Previous data stays servable.
    pub fn set_error(&self, key: &QueryKey, error: QueryError) {
        let _gate = self.inner.write_gate.lock();
        let listeners = {
            let mut entries = self.inner.entries.lock();
            let slot = self.inner.slot_mut(&mut entries, key);
            slot.entry.status = QueryStatus::Error;
            slot.entry.error = Some(error);
            slot.entry.is_fetching = false;
            slot.listeners()
        };
        self.inner.notify(key, CacheEventKind::Errored, listeners);
    }

    /// Atomically rewrites the data of `key`.
    ///
    /// `apply` receives the current data and returns the replacement, or
    /// `None` to leave the entry untouched. It runs under the store lock and
    /// must not call back into the store. Returns true if the entry changed.
    pub fn update<F>(&self, key: &QueryKey, apply: F) -> bool
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        matches!(self.try_update(key, |data| Ok(apply(data))), Ok(true))
    }

    /// Like [`update`](Self::update), but `apply` may refuse with an error.
    pub fn try_update<F>(&self, key: &QueryKey, apply: F) -> Result<bool>
    where
        F: FnOnce(Option<&Value>) -> Result<Option<Value>>,
    {
        let _gate = self.inner.write_gate.lock();
        let listeners = {
            let mut entries = self.inner.entries.lock();
            let slot = self.inner.slot_mut(&mut entries, key);
            let Some(next) = apply(slot.entry.data.as_ref())? else {
                return Ok(false);
            };
            slot.entry.data = Some(next);
            slot.entry.status = QueryStatus::Success;
            slot.listeners()
        };
        self.inner.notify(key, CacheEventKind::Updated, listeners);
        Ok(true)
    }

    /// Restores an entry to a previously captured snapshot.
    ///
    /// `None` means the key held nothing when the snapshot was taken; its
    /// data is cleared. Subscribers and the fetching flag are preserved, and
    /// an invalidation that landed after the snapshot still holds.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<&CacheEntry>) {
        let _gate = self.inner.write_gate.lock();
        let listeners = {
            let mut entries = self.inner.entries.lock();
            let slot = self.inner.slot_mut(&mut entries, key);
            let entry = &mut slot.entry;
            match snapshot {
                Some(previous) => {
                    entry.data = previous.data.clone();
                    entry.status = previous.status;
                    entry.error = previous.error.clone();
                    entry.fetched_at = previous.fetched_at;
                    entry.invalidated = previous.invalidated || entry.invalidated;
                },
                None => {
                    entry.data = None;
                    entry.status = QueryStatus::Idle;
                    entry.error = None;
                    entry.fetched_at = None;
                },
            }
            slot.listeners()
        };
        self.inner.notify(key, CacheEventKind::Updated, listeners);
    }

    /// Flags a fetch as running or finished without notifying.
    pub fn mark_fetching(&self, key: &QueryKey, fetching: bool) {
        let mut entries = self.inner.entries.lock();
        let entry = &mut self.inner.slot_mut(&mut entries, key).entry;
        entry.is_fetching = fetching;
        if fetching && entry.data.is_none() {
            entry.status = QueryStatus::Loading;
        }
    }

    /// Applies per-query timing options, creating the entry if needed.
    pub fn configure(&self, key: &QueryKey, options: &QueryOptions) {
        let mut entries = self.inner.entries.lock();
        let entry = &mut self.inner.slot_mut(&mut entries, key).entry;
        entry.stale_after = self.inner.config.stale_time_for(options);
        entry.collect_after = self.inner.config.gc_time_for(options);
    }

    /// Subscribes to events for `key`.
    ///
    /// The entry is created if it does not exist, so that it is retained
    /// while observed. Dropping the returned guard unsubscribes.
    pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> Subscription
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.inner.entries.lock();
            let slot = self.inner.slot_mut(&mut entries, key);
            slot.listeners.push((id, Arc::new(listener)));
            slot.entry.subscriber_count = slot.listeners.len();
        }
        Subscription {
            store: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
        }
    }

    /// Returns the number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner
            .entries
            .lock()
            .get(key)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Marks every entry selected by `filter` as stale.
    ///
    /// Data is kept. Subscribers of each matching key receive an
    /// [`CacheEventKind::Invalidated`] event; refetching is up to them.
    /// Returns the matched keys in key order. Predicate filters run under
    /// the store lock and must not call back into the store.
    pub fn invalidate(&self, filter: &KeyFilter) -> Vec<QueryKey> {
        let _gate = self.inner.write_gate.lock();
        let mut matched = {
            let mut entries = self.inner.entries.lock();
            entries
                .iter_mut()
                .filter(|(key, _)| filter.matches(key))
                .map(|(key, slot)| {
                    slot.entry.invalidated = true;
                    (key.clone(), slot.listeners())
                })
                .collect::<Vec<_>>()
        };
        matched.sort_by(|(a, _), (b, _)| a.cmp(b));

        self.inner.metrics.record_invalidations(matched.len());
        debug!(filter = %filter, count = matched.len(), "Entries marked stale");

        matched
            .into_iter()
            .map(|(key, listeners)| {
                self.inner
                    .notify(&key, CacheEventKind::Invalidated, listeners);
                key
            })
            .collect()
    }

    /// Removes unobserved entries idle for longer than their GC time.
    ///
    /// Returns the number of entries removed.
    pub fn garbage_collect(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|_, slot| !slot.entry.is_collectable(now));
        let removed = before - entries.len();

        for _ in 0..removed {
            self.inner.metrics.record_eviction("gc");
        }
        self.inner.metrics.update_entry_count(entries.len());
        removed
    }

    /// Removes one entry, notifying its subscribers.
    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntry> {
        let _gate = self.inner.write_gate.lock();
        let slot = self.inner.entries.lock().remove(key)?;
        self.inner
            .notify(key, CacheEventKind::Removed, slot.listeners());
        Some(slot.entry)
    }

    /// Returns every cached key in key order.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.inner.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Drops every entry and listener. Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let _gate = self.inner.write_gate.lock();
        let mut entries = self.inner.entries.lock();
        let count = entries.len();
        entries.clear();
        self.inner.metrics.update_entry_count(0);
        count
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Live subscription to one key. Unsubscribes on drop.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    key: QueryKey,
    id: u64,
}

impl Subscription {
    /// Returns the subscribed key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(&self.key, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<CacheEvent>>>, impl Fn(&CacheEvent) + Send + Sync + 'static) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: &CacheEvent| sink.lock().push(event.clone()))
    }

    #[test]
    fn test_set_and_get() {
        let store = CacheStore::default();
        let key = QueryKey::new("posts");

        assert!(store.get(&key).is_none());
        store.set(&key, json!([1, 2]));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, QueryStatus::Success);
        assert_eq!(entry.data, Some(json!([1, 2])));
        assert!(entry.fetched_at.is_some());
        assert_eq!(store.metrics().hits(), 1);
        assert_eq!(store.metrics().misses(), 1);
    }

    #[test]
    fn test_set_error_keeps_data() {
        let store = CacheStore::default();
        let key = QueryKey::new("posts");
        store.set(&key, json!("last good"));

        store.set_error(&key, QueryError::network("offline"));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.data, Some(json!("last good")));
        assert_eq!(entry.error, Some(QueryError::network("offline")));
    }

    #[test]
    fn test_listeners_observe_state_after_write() {
        let store = CacheStore::default();
        let key = QueryKey::new("posts");
        let observed = Arc::new(Mutex::new(Vec::new()));

        let reader = store.clone();
        let sink = Arc::clone(&observed);
        let _sub = store.subscribe(&key, move |event| {
            let data = reader.peek(&event.key).and_then(|e| e.data);
            sink.lock().push(data);
        });

        store.set(&key, json!(1));
        store.set(&key, json!(2));

        assert_eq!(*observed.lock(), vec![Some(json!(1)), Some(json!(2))]);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let store = CacheStore::default();
        let key = QueryKey::new("posts");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = store.subscribe(&key, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.subscriber_count(&key), 1);

        store.set(&key, json!(1));
        drop(sub);
        store.set(&key, json!(2));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(&key), 0);
    }

    #[test]
    fn test_invalidate_marks_stale_and_keeps_data() {
        let config = CacheConfig {
            stale_time: Duration::from_secs(60),
            ..CacheConfig::default()
        };
        let store = CacheStore::new(config);
        let key = QueryKey::new("userPosts").with(1);
        let other = QueryKey::new("tags");
        store.set(&key, json!(["a"]));
        store.set(&other, json!(["t"]));
        assert!(!store.peek(&key).unwrap().is_stale());

        let (events, listener) = recorder();
        let _sub = store.subscribe(&key, listener);

        let matched = store.invalidate(&KeyFilter::prefix(QueryKey::new("userPosts")));

        assert_eq!(matched, vec![key.clone()]);
        let entry = store.peek(&key).unwrap();
        assert!(entry.is_stale());
        assert_eq!(entry.data, Some(json!(["a"])));
        assert!(!store.peek(&other).unwrap().is_stale());
        assert_eq!(events.lock()[0].kind, CacheEventKind::Invalidated);
    }

    #[test]
    fn test_update_is_atomic_and_can_refuse() {
        let store = CacheStore::default();
        let key = QueryKey::new("count");
        store.set(&key, json!(1));

        let changed = store.update(&key, |data| data.and_then(Value::as_i64).map(|n| json!(n + 1)));
        assert!(changed);
        assert_eq!(store.get_data::<i64>(&key).unwrap(), Some(2));

        let refused = store.try_update(&key, |_| Err(QueryError::busy("count")));
        assert!(refused.unwrap_err().is_busy());
        assert_eq!(store.get_data::<i64>(&key).unwrap(), Some(2));
    }

    #[test]
    fn test_restore_snapshot() {
        let store = CacheStore::default();
        let key = QueryKey::new("item");
        store.set(&key, json!("before"));
        let snapshot = store.peek(&key);

        store.update(&key, |_| Some(json!("optimistic")));
        store.restore(&key, snapshot.as_ref());
        assert_eq!(store.peek(&key).unwrap().data, Some(json!("before")));

        let missing = QueryKey::new("new");
        store.update(&missing, |_| Some(json!("optimistic")));
        store.restore(&missing, None);
        let entry = store.peek(&missing).unwrap();
        assert_eq!(entry.data, None);
        assert_eq!(entry.status, QueryStatus::Idle);
    }

    #[test]
    fn test_restore_keeps_later_invalidation() {
        let config = CacheConfig {
            stale_time: Duration::from_secs(60),
            ..CacheConfig::default()
        };
        let store = CacheStore::new(config);
        let key = QueryKey::new("item");
        store.set(&key, json!("before"));
        let snapshot = store.peek(&key);
        assert!(!snapshot.as_ref().unwrap().is_stale());

        store.update(&key, |_| Some(json!("optimistic")));
        store.invalidate(&KeyFilter::exact(key.clone()));
        store.restore(&key, snapshot.as_ref());

        let entry = store.peek(&key).unwrap();
        assert_eq!(entry.data, Some(json!("before")));
        assert!(entry.invalidated);
        assert!(entry.is_stale());
    }

    #[test]
    fn test_listener_can_write_back() {
        let store = CacheStore::default();
        let key = QueryKey::new("source");
        let mirror = QueryKey::new("mirror");

        let writer = store.clone();
        let target = mirror.clone();
        let _sub = store.subscribe(&key, move |event| {
            if event.kind == CacheEventKind::Updated {
                writer.set(&target, json!("copied"));
            }
        });

        store.set(&key, json!("value"));
        assert_eq!(store.peek(&mirror).unwrap().data, Some(json!("copied")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_collect_spares_observed_entries() {
        let config = CacheConfig {
            gc_time: Duration::from_secs(10),
            ..CacheConfig::default()
        };
        let store = CacheStore::new(config);
        let observed = QueryKey::new("observed");
        let unobserved = QueryKey::new("unobserved");
        store.set(&observed, json!(1));
        store.set(&unobserved, json!(2));
        let _sub = store.subscribe(&observed, |_| {});

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.garbage_collect(), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.garbage_collect(), 1);
        assert!(store.peek(&unobserved).is_none());
        assert!(store.peek(&observed).is_some());
        assert_eq!(store.metrics().evictions(), 1);
    }

    #[test]
    fn test_remove_notifies_and_clear_empties() {
        let store = CacheStore::default();
        let key = QueryKey::new("posts");
        store.set(&key, json!(1));
        store.set(&QueryKey::new("tags"), json!(2));

        let (events, listener) = recorder();
        let _sub = store.subscribe(&key, listener);

        assert!(store.remove(&key).is_some());
        assert_eq!(events.lock()[0].kind, CacheEventKind::Removed);
        assert_eq!(store.keys(), vec![QueryKey::new("tags")]);

        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }
}
