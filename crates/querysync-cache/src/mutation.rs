//! Optimistic mutations with snapshot rollback.
//!
//! Every mutation settles exactly one way: when the operation succeeds the
//! configured filters are invalidated; when it fails, or the mutation future
//! is dropped before it settles, the optimistic changes are rolled back and
//! nothing is invalidated.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Instant;

use querysync_core::{KeyFilter, QueryKey, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::invalidation::{InvalidationResult, InvalidationRouter};
use crate::store::{CacheEntry, CacheStore};

/// Lifecycle of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Optimistic changes applied, operation in flight.
    Applied,
    /// The operation succeeded; snapshots were discarded.
    Committed,
    /// The operation failed; snapshots were restored.
    RolledBack,
}

/// Snapshots of the entries an optimistic update touches.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    id: Uuid,
    target_keys: Vec<QueryKey>,
    snapshots: HashMap<QueryKey, Option<CacheEntry>>,
    status: MutationStatus,
}

impl PendingMutation {
    /// Captures the current entries for `keys`.
    ///
    /// Call this before writing the optimistic values.
    pub fn capture<I>(store: &CacheStore, keys: I) -> Self
    where
        I: IntoIterator<Item = QueryKey>,
    {
        let mut target_keys = Vec::new();
        let mut snapshots = HashMap::new();
        for key in keys {
            if snapshots.contains_key(&key) {
                continue;
            }
            snapshots.insert(key.clone(), store.peek(&key));
            target_keys.push(key);
        }
        Self {
            id: Uuid::now_v7(),
            target_keys,
            snapshots,
            status: MutationStatus::Applied,
        }
    }

    /// Returns the mutation id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the keys this mutation touches, in capture order.
    pub fn target_keys(&self) -> &[QueryKey] {
        &self.target_keys
    }

    /// Returns the pre-mutation entry for `key`, if the key held one.
    pub fn snapshot(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.snapshots.get(key).and_then(Option::as_ref)
    }

    /// Returns where the mutation stands.
    pub fn status(&self) -> MutationStatus {
        self.status
    }

    /// Restores every touched key to its snapshot.
    pub fn restore(&self, store: &CacheStore) {
        for key in &self.target_keys {
            store.restore(key, self.snapshot(key));
        }
    }
}

type OptimisticHook = Box<dyn FnOnce(&CacheStore) -> Result<PendingMutation> + Send>;
type RollbackHook = Box<dyn FnOnce(&CacheStore, &PendingMutation) + Send>;
type SuccessHook<T> = Box<dyn FnOnce(&CacheStore, &T) + Send>;

/// Hooks of one mutation.
///
/// # Examples
///
/// ```
/// use querysync_cache::{MutationConfig, PendingMutation};
/// use querysync_core::{KeyFilter, QueryKey};
/// use serde_json::json;
///
/// let key = QueryKey::new("post").with(1);
/// let config: MutationConfig<()> = MutationConfig::new()
///     .optimistic({
///         let key = key.clone();
///         move |store| {
///             let pending = PendingMutation::capture(store, [key.clone()]);
///             store.set(&key, json!({"archived": true}));
///             Ok(pending)
///         }
///     })
///     .invalidates(KeyFilter::containing("archive"));
/// ```
pub struct MutationConfig<T> {
    optimistic: Option<OptimisticHook>,
    rollback: Option<RollbackHook>,
    on_success: Option<SuccessHook<T>>,
    invalidates: Vec<KeyFilter>,
}

impl<T> MutationConfig<T> {
    /// Creates a config with no hooks and nothing to invalidate.
    pub fn new() -> Self {
        Self {
            optimistic: None,
            rollback: None,
            on_success: None,
            invalidates: Vec::new(),
        }
    }

    /// Sets the optimistic update.
    ///
    /// It runs before the operation starts and returns the snapshots of the
    /// keys it touched. Returning an error aborts the mutation: the
    /// operation is never invoked and neither rollback nor invalidation runs.
    pub fn optimistic<F>(mut self, apply: F) -> Self
    where
        F: FnOnce(&CacheStore) -> Result<PendingMutation> + Send + 'static,
    {
        self.optimistic = Some(Box::new(apply));
        self
    }

    /// Sets the rollback. Defaults to [`PendingMutation::restore`].
    pub fn rollback<F>(mut self, rollback: F) -> Self
    where
        F: FnOnce(&CacheStore, &PendingMutation) + Send + 'static,
    {
        self.rollback = Some(Box::new(rollback));
        self
    }

    /// Sets a hook that runs with the operation's result before invalidation.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&CacheStore, &T) + Send + 'static,
    {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Adds a filter to invalidate on success.
    pub fn invalidates(mut self, filter: impl Into<KeyFilter>) -> Self {
        self.invalidates.push(filter.into());
        self
    }

    /// Adds several filters to invalidate on success.
    pub fn invalidates_all<I>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = KeyFilter>,
    {
        self.invalidates.extend(filters);
        self
    }
}

impl<T> Default for MutationConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MutationConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationConfig")
            .field("optimistic", &self.optimistic.is_some())
            .field("rollback", &self.rollback.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

/// Rolls back on drop unless committed.
struct Settlement<'a> {
    store: &'a CacheStore,
    pending: Option<PendingMutation>,
    rollback: Option<RollbackHook>,
}

impl Settlement<'_> {
    fn commit(mut self) -> Option<PendingMutation> {
        let mut pending = self.pending.take()?;
        pending.status = MutationStatus::Committed;
        Some(pending)
    }

    fn roll_back(mut self) {
        self.run_rollback();
    }

    fn run_rollback(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        match self.rollback.take() {
            Some(rollback) => rollback(self.store, &pending),
            None => pending.restore(self.store),
        }
        pending.status = MutationStatus::RolledBack;
        debug!(
            mutation_id = %pending.id,
            keys = pending.target_keys.len(),
            "Optimistic changes rolled back"
        );
    }
}

impl Drop for Settlement<'_> {
    fn drop(&mut self) {
        self.run_rollback();
    }
}

/// Runs write operations against the cache.
#[derive(Debug, Clone)]
pub struct MutationExecutor {
    store: CacheStore,
    router: InvalidationRouter,
}

impl MutationExecutor {
    /// Creates an executor over `store`.
    pub fn new(store: CacheStore) -> Self {
        let router = InvalidationRouter::new(store.clone());
        Self { store, router }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Runs `operation` under `config`.
    ///
    /// The optimistic update, if any, is applied before `operation` is
    /// invoked. On failure the rollback runs and the error is returned
    /// unchanged; on success the configured filters are invalidated.
    pub async fn mutate<T, F, Fut>(&self, operation: F, config: MutationConfig<T>) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let MutationConfig {
            optimistic,
            rollback,
            on_success,
            invalidates,
        } = config;

        let pending = match optimistic {
            Some(apply) => Some(apply(&self.store).inspect_err(|e| {
                debug!(error = %e, "Optimistic update refused, mutation not started");
                self.store.metrics().record_mutation("refused");
            })?),
            None => None,
        };
        let mutation_id = pending.as_ref().map(PendingMutation::id);
        let settlement = Settlement {
            store: &self.store,
            pending,
            rollback,
        };

        let start = Instant::now();
        let outcome = operation().await;
        self.store
            .metrics()
            .record_operation_duration("mutate", start.elapsed());

        match outcome {
            Ok(value) => {
                let committed = settlement.commit();
                if let Some(hook) = on_success {
                    hook(&self.store, &value);
                }
                let InvalidationResult { count, .. } = self.router.invalidate_many(invalidates);
                self.store.metrics().record_mutation("invalidated");
                debug!(
                    mutation_id = ?mutation_id,
                    touched = committed.map_or(0, |p| p.target_keys.len()),
                    invalidated = count,
                    "Mutation committed"
                );
                Ok(value)
            },
            Err(error) => {
                settlement.roll_back();
                self.store.metrics().record_mutation("rolled_back");
                warn!(mutation_id = ?mutation_id, error = %error, "Mutation failed");
                Err(error)
            },
        }
    }
}
