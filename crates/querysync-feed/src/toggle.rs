//! Optimistic binary relationship toggles (archive, follow).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use querysync_cache::{CacheStore, MutationConfig, MutationExecutor, PendingMutation, QueryClient, Subscription};
use querysync_core::{KeyFilter, QueryError, QueryKey, Result, ServerToggle, ToggleState};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// How a toggle request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The server accepted the toggle; holds its authoritative state.
    Settled(ToggleState),
    /// Another toggle of the same relationship was still pending.
    Ignored,
}

/// Runs relationship toggles through the mutation executor.
///
/// Each relationship is a cache entry holding a [`ToggleState`]. A toggle
/// flips it optimistically, then either overwrites it with the server's
/// values or restores the snapshot taken before the flip. While a toggle is
/// pending, further toggles of the same key are ignored.
///
/// Seeded relationships are held as observed, so garbage collection keeps
/// them until [`release`](Self::release) is called or every clone of the
/// coordinator is dropped.
///
/// # Example
///
/// ```
/// use querysync_cache::QueryClient;
/// use querysync_core::{QueryKey, ServerToggle, ToggleState};
/// use querysync_feed::{ToggleCoordinator, ToggleOutcome};
///
/// # #[tokio::main]
/// # async fn main() -> querysync_core::Result<()> {
/// let client = QueryClient::default();
/// let toggles = ToggleCoordinator::new(&client);
/// let key = QueryKey::new("archive").with(42);
///
/// toggles.seed(&key, ServerToggle::new(false, 3))?;
/// let outcome = toggles
///     .toggle(&key, || async { Ok(ServerToggle::new(true, 5)) }, [])
///     .await?;
///
/// assert_eq!(outcome, ToggleOutcome::Settled(ToggleState::new(true, 5)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToggleCoordinator {
    store: CacheStore,
    executor: MutationExecutor,
    retained: Arc<Mutex<HashMap<QueryKey, Subscription>>>,
}

impl ToggleCoordinator {
    /// Creates a coordinator over the client's store.
    pub fn new(client: &QueryClient) -> Self {
        Self {
            store: client.store().clone(),
            executor: client.executor().clone(),
            retained: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seeds a relationship from the server's initial payload.
    ///
    /// Returns false, leaving the entry alone, while a toggle is pending.
    pub fn seed(&self, key: &QueryKey, server: ServerToggle) -> Result<bool> {
        let seeded = self.store.try_update(key, |data| {
            if decode(data)?.is_some_and(|state| state.pending) {
                return Ok(None);
            }
            Ok(Some(serde_json::to_value(ToggleState::from(server))?))
        })?;
        self.retain(key);
        Ok(seeded)
    }

    fn retain(&self, key: &QueryKey) {
        let mut retained = self.retained.lock();
        if !retained.contains_key(key) {
            let subscription = self.store.subscribe(key, |_| {});
            retained.insert(key.clone(), subscription);
        }
    }

    /// Returns the current state of a relationship.
    pub fn state(&self, key: &QueryKey) -> Option<ToggleState> {
        match self.store.get_data::<ToggleState>(key) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %key, error = %e, "Cached toggle state could not be decoded");
                None
            },
        }
    }

    /// Drops a relationship the owner no longer renders.
    pub fn release(&self, key: &QueryKey) -> Option<ToggleState> {
        drop(self.retained.lock().remove(key));
        let entry = self.store.remove(key)?;
        decode(entry.data.as_ref()).ok().flatten()
    }

    /// Toggles a relationship.
    ///
    /// The state flips before `server_call` runs: `is_active` is inverted
    /// and `count` moves by one. On success the server's values replace the
    /// guess and `invalidates` is fired; on failure the pre-toggle state is
    /// restored and the error is returned.
    ///
    /// # Errors
    ///
    /// - the error of `server_call`, after rollback
    /// - `QueryError::Internal` if `key` was never seeded
    pub async fn toggle<F, Fut, I>(&self, key: &QueryKey, server_call: F, invalidates: I) -> Result<ToggleOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ServerToggle>>,
        I: IntoIterator<Item = KeyFilter>,
    {
        let refused = Arc::new(AtomicBool::new(false));
        let config = MutationConfig::new()
            .optimistic({
                let key = key.clone();
                let refused = Arc::clone(&refused);
                move |store: &CacheStore| {
                    let pending = PendingMutation::capture(store, [key.clone()]);
                    let flipped = store.try_update(&key, |data| {
                        let current = decode(data)?
                            .ok_or_else(|| QueryError::internal(format!("toggle '{key}' was never seeded")))?;
                        if current.pending {
                            return Err(QueryError::busy(&key));
                        }
                        Ok(Some(serde_json::to_value(current.flipped())?))
                    });
                    if let Err(e) = flipped {
                        refused.store(e.is_busy(), Ordering::SeqCst);
                        return Err(e);
                    }
                    Ok(pending)
                }
            })
            .on_success({
                let key = key.clone();
                move |store: &CacheStore, server: &ServerToggle| {
                    if let Err(e) = store.set_data(&key, &ToggleState::settled(*server)) {
                        warn!(key = %key, error = %e, "Server toggle state could not be stored");
                    }
                }
            })
            .invalidates_all(invalidates);

        match self.executor.mutate(server_call, config).await {
            Ok(server) => {
                debug!(key = %key, is_active = server.is_active, count = server.count, "Toggle settled");
                Ok(ToggleOutcome::Settled(ToggleState::settled(server)))
            },
            Err(_) if refused.load(Ordering::SeqCst) => {
                debug!(key = %key, "Toggle ignored while another is pending");
                Ok(ToggleOutcome::Ignored)
            },
            Err(e) => {
                debug!(key = %key, error = %e, "Toggle rolled back");
                Err(e)
            },
        }
    }
}

fn decode(data: Option<&Value>) -> Result<Option<ToggleState>> {
    match data {
        Some(value) => Ok(Some(ToggleState::deserialize(value)?)),
        None => Ok(None),
    }
}
