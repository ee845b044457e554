//! Cache metrics recording.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("querysync_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!(
        "querysync_cache_misses_total",
        "Total number of cache misses"
    );
    metrics::describe_counter!(
        "querysync_cache_fetches_total",
        "Total number of producer invocations"
    );
    metrics::describe_counter!(
        "querysync_cache_fetch_retries_total",
        "Total number of retried fetch attempts"
    );
    metrics::describe_counter!(
        "querysync_cache_dedup_joins_total",
        "Total number of fetches that joined an in-flight request"
    );
    metrics::describe_counter!(
        "querysync_cache_invalidations_total",
        "Total number of entries marked stale by invalidation"
    );
    metrics::describe_counter!(
        "querysync_cache_evictions_total",
        "Total number of entries removed by garbage collection"
    );
    metrics::describe_counter!(
        "querysync_cache_mutations_total",
        "Total number of settled mutations by outcome"
    );
    metrics::describe_gauge!(
        "querysync_cache_entries",
        "Current number of entries in cache"
    );
    metrics::describe_histogram!(
        "querysync_cache_operation_seconds",
        "Time spent on cache operations"
    );
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos para inspeccion sin exporter.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
    retries: Arc<AtomicU64>,
    dedup_joins: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    rollbacks: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_hits_total").increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_misses_total").increment(1);
    }

    /// Registra una invocacion del producer
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_fetches_total").increment(1);
    }

    /// Registra un reintento
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_fetch_retries_total").increment(1);
    }

    /// Registra un caller que se unio a un fetch en vuelo
    pub fn record_dedup_join(&self) {
        self.dedup_joins.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_dedup_joins_total").increment(1);
    }

    /// Registra entries invalidadas
    pub fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
        counter!("querysync_cache_invalidations_total").increment(count as u64);
    }

    /// Registra una eviction
    pub fn record_eviction(&self, reason: &str) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        counter!("querysync_cache_evictions_total", "reason" => reason.to_string()).increment(1);
    }

    /// Registra el resultado de una mutacion
    pub fn record_mutation(&self, outcome: &str) {
        if outcome == "rolled_back" {
            self.rollbacks.fetch_add(1, Ordering::Relaxed);
        }
        counter!("querysync_cache_mutations_total", "outcome" => outcome.to_string()).increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: usize) {
        gauge!("querysync_cache_entries").set(count as f64);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &str, duration: Duration) {
        histogram!(
            "querysync_cache_operation_seconds",
            "operation" => operation.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Helper para medir tiempo de operacion
    pub fn time_operation<T, F: FnOnce() -> T>(&self, operation: &str, f: F) -> T {
        let start = Instant::now();
        let result = f();
        self.record_operation_duration(operation, start.elapsed());
        result
    }

    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let misses = self.misses() as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Numero de invocaciones reales del producer
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn dedup_joins(&self) -> u64 {
        self.dedup_joins.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_metrics_hit_rate() {
        let metrics = CacheMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let rate = metrics.hit_rate();
        assert!((rate - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_hit_rate_without_traffic() {
        assert_eq!(CacheMetrics::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_operation_timing() {
        let metrics = CacheMetrics::new();
        let result = metrics.time_operation("test_op", || 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = CacheMetrics::new();
        let clone = metrics.clone();

        clone.record_fetch();
        clone.record_invalidations(3);
        clone.record_mutation("rolled_back");
        clone.record_mutation("invalidated");

        assert_eq!(metrics.fetches(), 1);
        assert_eq!(metrics.invalidations(), 3);
        assert_eq!(metrics.rollbacks(), 1);
    }
}
