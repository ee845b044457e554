//! The query client: one explicitly constructed cache context.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use querysync_core::{QueryError, QueryKey, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, QueryOptions};
use crate::fetcher::Fetcher;
use crate::gc::{GcHandle, GcScheduler};
use crate::invalidation::InvalidationRouter;
use crate::metrics::CacheMetrics;
use crate::mutation::MutationExecutor;
use crate::store::{CacheEntry, CacheEvent, CacheEventKind, CacheStore, Subscription};

/// Type-erased data producer used by watched queries.
pub type Producer = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Owns the cache store and every component that reads or writes it.
///
/// Create one client per application and pass it (or its components) to
/// every consumer. [`dispose_all`](Self::dispose_all) tears it down.
///
/// # Examples
///
/// ```
/// use querysync_cache::{CacheConfig, QueryClient, QueryOptions};
/// use querysync_core::QueryKey;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> querysync_core::Result<()> {
/// let client = QueryClient::new(CacheConfig::default());
/// let key = QueryKey::new("tags");
///
/// let tags = client
///     .fetch_query(&key, || async { Ok(json!(["rust"])) }, &QueryOptions::default())
///     .await?;
/// assert_eq!(tags, json!(["rust"]));
///
/// client.dispose_all();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryClient {
    store: CacheStore,
    fetcher: Fetcher,
    router: InvalidationRouter,
    executor: MutationExecutor,
    gc: Arc<Mutex<Option<GcHandle>>>,
}

impl QueryClient {
    /// Creates a client with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(CacheStore::new(config))
    }

    /// Creates a client over an existing store.
    pub fn with_store(store: CacheStore) -> Self {
        Self {
            fetcher: Fetcher::new(store.clone()),
            router: InvalidationRouter::new(store.clone()),
            executor: MutationExecutor::new(store.clone()),
            gc: Arc::new(Mutex::new(None)),
            store,
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the deduplicating fetcher.
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Returns the invalidation router.
    pub fn router(&self) -> &InvalidationRouter {
        &self.router
    }

    /// Returns the mutation executor.
    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    /// Returns the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        self.store.config()
    }

    /// Returns the cache metrics.
    pub fn metrics(&self) -> &CacheMetrics {
        self.store.metrics()
    }

    /// Returns fresh cached data for `key`, or fetches it.
    ///
    /// Stale or missing data is fetched through the deduplicating fetcher.
    pub async fn fetch_query<F, Fut>(&self, key: &QueryKey, producer: F, options: &QueryOptions) -> Result<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        if self.fetcher.is_disposed() {
            return Err(QueryError::Disposed);
        }
        self.store.configure(key, options);
        if let Some(entry) = self.store.get(key)
            && !entry.is_stale()
            && let Some(data) = entry.data
        {
            debug!(key = %key, "Serving fresh cached data");
            return Ok(data);
        }
        self.fetcher.fetch(key, producer, options).await
    }

    /// Like [`fetch_query`](Self::fetch_query), decoding the data as `T`.
    pub async fn fetch_query_as<T, F, Fut>(&self, key: &QueryKey, producer: F, options: &QueryOptions) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let data = self.fetch_query(key, producer, options).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Observes `key`, keeping it fetched while the observer lives.
    ///
    /// A background fetch starts right away when the entry is missing or
    /// stale, and again whenever the key is invalidated. `listener` receives
    /// every event for the key. Must be called within a Tokio runtime for
    /// the background fetches to run.
    pub fn watch<L>(&self, key: QueryKey, producer: Producer, options: QueryOptions, listener: L) -> QueryObserver
    where
        L: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.store.configure(&key, &options);
        let refetch = Refetch {
            fetcher: self.fetcher.clone(),
            key: key.clone(),
            producer,
            options,
        };

        let on_event = {
            let refetch = refetch.clone();
            move |event: &CacheEvent| {
                listener(event);
                if event.kind == CacheEventKind::Invalidated {
                    refetch.spawn();
                }
            }
        };
        let subscription = self.store.subscribe(&key, on_event);

        let needs_fetch = self
            .store
            .peek(&key)
            .is_none_or(|entry| !entry.has_data() || entry.is_stale());
        if needs_fetch {
            refetch.spawn();
        }

        QueryObserver {
            store: self.store.clone(),
            refetch,
            _subscription: subscription,
        }
    }

    /// Starts periodic garbage collection, if not already running.
    pub fn start_gc(&self) {
        let mut gc = self.gc.lock();
        if gc.is_none() {
            *gc = Some(GcScheduler::with_defaults(self.store.clone()).start());
        }
    }

    /// Stops periodic garbage collection.
    pub fn stop_gc(&self) {
        if let Some(handle) = self.gc.lock().take() {
            handle.stop();
        }
    }

    /// Returns true if the GC scheduler is running.
    pub fn is_gc_running(&self) -> bool {
        self.gc.lock().is_some()
    }

    /// Tears the client down.
    ///
    /// Stops GC, refuses every later fetch with [`QueryError::Disposed`],
    /// and drops every entry and listener.
    pub fn dispose_all(&self) {
        self.stop_gc();
        self.fetcher.dispose();
        let dropped = self.store.clear();
        info!(entries = dropped, "Query client disposed");
    }

    /// Returns true once the client was disposed.
    pub fn is_disposed(&self) -> bool {
        self.fetcher.is_disposed()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("store", &self.store)
            .field("fetcher", &self.fetcher)
            .field("gc_running", &self.is_gc_running())
            .finish()
    }
}

#[derive(Clone)]
struct Refetch {
    fetcher: Fetcher,
    key: QueryKey,
    producer: Producer,
    options: QueryOptions,
}

impl Refetch {
    async fn run(&self) -> Result<Value> {
        let producer = Arc::clone(&self.producer);
        self.fetcher
            .fetch(&self.key, move || producer(), &self.options)
            .await
    }

    fn spawn(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No runtime available, background fetch skipped");
            return;
        };
        let refetch = self.clone();
        runtime.spawn(async move {
            if let Err(e) = refetch.run().await {
                debug!(key = %refetch.key, error = %e, "Background fetch failed");
            }
        });
    }
}

/// Live observation of one query. Unsubscribes on drop.
#[must_use = "dropping an observer stops observing the query"]
pub struct QueryObserver {
    store: CacheStore,
    refetch: Refetch,
    _subscription: Subscription,
}

impl QueryObserver {
    /// Returns the observed key.
    pub fn key(&self) -> &QueryKey {
        &self.refetch.key
    }

    /// Returns the current entry.
    pub fn current(&self) -> Option<CacheEntry> {
        self.store.peek(&self.refetch.key)
    }

    /// Returns the current data.
    pub fn data(&self) -> Option<Value> {
        self.current().and_then(|entry| entry.data)
    }

    /// Fetches the query now, joining any fetch already running.
    pub async fn refetch(&self) -> Result<Value> {
        self.refetch.run().await
    }
}

impl fmt::Debug for QueryObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", self.key())
            .finish()
    }
}
