//! Background garbage collection scheduler.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::store::CacheStore;

/// Handle for controlling a running GC scheduler.
///
/// Dropping the handle stops the scheduler.
#[derive(Debug)]
pub struct GcHandle {
    /// Sender to signal shutdown.
    shutdown_tx: watch::Sender<bool>,
}

impl GcHandle {
    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns true once the scheduler task has exited.
    pub fn is_stopped(&self) -> bool {
        self.shutdown_tx.is_closed()
    }
}

impl Drop for GcHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Periodically removes unobserved, expired entries from a store.
#[derive(Debug)]
pub struct GcScheduler {
    store: CacheStore,
    interval: Duration,
}

impl GcScheduler {
    /// Creates a scheduler sweeping `store` every `interval`.
    pub fn new(store: CacheStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Creates a scheduler using the store's configured sweep interval.
    pub fn with_defaults(store: CacheStore) -> Self {
        let interval = store.config().gc_interval;
        Self::new(store, interval)
    }

    /// Starts the background sweep task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> GcHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = GcHandle { shutdown_tx };

        tokio::spawn(self.run(shutdown_rx));

        handle
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timer = interval(self.interval.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        info!(interval = ?self.interval, "Starting cache GC scheduler");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep();
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Cache GC scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Runs one sweep. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.store.garbage_collect();
        if removed > 0 {
            info!(removed = removed, remaining = self.store.len(), "Cache GC sweep");
        } else {
            debug!(remaining = self.store.len(), "Cache GC sweep, nothing to remove");
        }
        removed
    }
}
