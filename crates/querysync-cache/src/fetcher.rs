//! Deduplicating, retrying fetch execution.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use querysync_core::{QueryError, QueryKey, Result};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::{QueryOptions, RetryPolicy};
use crate::metrics::CacheMetrics;
use crate::store::CacheStore;

type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

struct FetcherInner {
    store: CacheStore,
    /// Fetches that write their result into the store.
    in_flight: Mutex<HashMap<QueryKey, SharedFetch>>,
    /// Fetches whose result is only handed back to the callers.
    coalescing: Mutex<HashMap<QueryKey, SharedFetch>>,
    disposed: AtomicBool,
}

/// Runs producers for cache keys.
///
/// Concurrent requests for the same key share one producer run. The run is
/// spawned onto the runtime, so a caller that stops waiting never cancels
/// the request for the others.
///
/// # Examples
///
/// ```
/// use querysync_cache::{CacheStore, Fetcher, QueryOptions};
/// use querysync_core::QueryKey;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> querysync_core::Result<()> {
/// let store = CacheStore::default();
/// let fetcher = Fetcher::new(store.clone());
/// let key = QueryKey::new("tags");
///
/// let data = fetcher
///     .fetch(&key, || async { Ok(json!(["rust"])) }, &QueryOptions::default())
///     .await?;
///
/// assert_eq!(data, json!(["rust"]));
/// assert_eq!(store.get(&key).unwrap().data, Some(json!(["rust"])));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<FetcherInner>,
}

impl Fetcher {
    /// Creates a fetcher writing into `store`.
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                store,
                in_flight: Mutex::new(HashMap::new()),
                coalescing: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    /// Fetches `key` and writes the outcome into the store.
    ///
    /// If a fetch for `key` is already running, the caller joins it instead
    /// of invoking `producer`. Transient failures are retried per the
    /// query's retry policy without notifying subscribers; only the final
    /// outcome is written, through `set` or `set_error`.
    ///
    /// # Errors
    ///
    /// - the producer's last error once retries are exhausted
    /// - `QueryError::Disposed` after [`dispose`](Self::dispose)
    /// - `QueryError::Internal` when polled outside a Tokio runtime
    pub async fn fetch<F, Fut>(&self, key: &QueryKey, producer: F, options: &QueryOptions) -> Result<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.ensure_active()?;
        let shared = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(key) {
                Some(running) => {
                    self.metrics().record_dedup_join();
                    debug!(key = %key, "Joining in-flight fetch");
                    running.clone()
                },
                None => {
                    let runtime = current_runtime()?;
                    self.inner.store.configure(key, options);
                    self.inner.store.mark_fetching(key, true);
                    let retry = self.inner.store.config().retry_for(options).clone();
                    let task = self.spawn(&runtime, key.clone(), producer, retry, true);
                    in_flight.insert(key.clone(), task.clone());
                    task
                },
            }
        };
        shared.await
    }

    /// Deduplicates and retries like [`fetch`](Self::fetch) without
    /// touching the store.
    pub async fn coalesce<F, Fut>(&self, key: &QueryKey, producer: F, retry: &RetryPolicy) -> Result<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.ensure_active()?;
        let shared = {
            let mut coalescing = self.inner.coalescing.lock();
            match coalescing.get(key) {
                Some(running) => {
                    self.metrics().record_dedup_join();
                    debug!(key = %key, "Joining in-flight request");
                    running.clone()
                },
                None => {
                    let task = self.spawn(&current_runtime()?, key.clone(), producer, retry.clone(), false);
                    coalescing.insert(key.clone(), task.clone());
                    task
                },
            }
        };
        shared.await
    }

    /// Returns true if a store-writing fetch for `key` is running.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }

    /// Returns the number of running fetches of both kinds.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len() + self.inner.coalescing.lock().len()
    }

    /// Refuses every later fetch with [`QueryError::Disposed`].
    ///
    /// Running fetches complete but no longer write into the store.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.in_flight.lock().clear();
        self.inner.coalescing.lock().clear();
    }

    /// Returns true once [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(QueryError::Disposed);
        }
        Ok(())
    }

    fn metrics(&self) -> &CacheMetrics {
        self.inner.store.metrics()
    }

    fn spawn<F, Fut>(&self, runtime: &Handle, key: QueryKey, producer: F, retry: RetryPolicy, write: bool) -> SharedFetch
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            debug!(key = %key, "Fetch started");
            let result = run_with_retry(&key, &producer, &retry, inner.store.metrics()).await;

            let registry = if write { &inner.in_flight } else { &inner.coalescing };
            registry.lock().remove(&key);

            if write && !inner.disposed.load(Ordering::SeqCst) {
                match &result {
                    Ok(data) => inner.store.set(&key, data.clone()),
                    Err(error) => inner.store.set_error(&key, error.clone()),
                }
            }
            debug!(key = %key, ok = result.is_ok(), "Fetch finished");
            result
        });

        handle
            .map(|joined| {
                joined.unwrap_or_else(|e| Err(QueryError::internal(format!("fetch task failed: {e}"))))
            })
            .boxed()
            .shared()
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("in_flight", &self.in_flight_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|_| QueryError::internal("fetch requires a Tokio runtime"))
}

async fn run_with_retry<F, Fut>(
    key: &QueryKey,
    producer: &F,
    policy: &RetryPolicy,
    metrics: &CacheMetrics,
) -> Result<Value>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut attempt = 0;
    loop {
        metrics.record_fetch();
        match producer().await {
            Ok(data) => return Ok(data),
            Err(error) if policy.should_retry(&error, attempt) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                metrics.record_retry();
                warn!(
                    key = %key,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            },
            Err(error) => {
                debug!(key = %key, attempts = attempt + 1, error = %error, "Fetch failed");
                return Err(error);
            },
        }
    }
}
