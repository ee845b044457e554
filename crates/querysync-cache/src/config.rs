//! Cache, query and retry configuration.

use std::time::Duration;

use querysync_core::QueryError;
use serde::Deserialize;

const DEFAULT_STALE_TIME_MS: u64 = 0;
const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;
const DEFAULT_GC_INTERVAL_MS: u64 = 60 * 1000;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30 * 1000;

/// Retry policy applied by the fetcher to transient failures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Backoff multiplier applied per retry.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Policy with `retries` immediate retries (no delay).
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Returns true if a failure after `attempt` retries should be retried.
    ///
    /// Only transient errors are retried.
    pub fn should_retry(&self, error: &QueryError, attempt: u32) -> bool {
        attempt < self.retries && error.is_transient()
    }

    /// Returns the delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let secs = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(self.max_delay)
    }
}

/// Per-query options.
///
/// Fields left as `None` fall back to the [`CacheConfig`] defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Age after which cached data is considered stale.
    pub stale_time: Option<Duration>,
    /// Time an unobserved entry is kept before garbage collection.
    pub gc_time: Option<Duration>,
    /// Retry policy for fetches of this query.
    pub retry: Option<RetryPolicy>,
}

impl QueryOptions {
    /// Returns options with the given stale time.
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Returns options with the given GC time.
    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = Some(gc_time);
        self
    }

    /// Returns options with the given retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Configuracion del cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default stale time (default: 0, data is stale as soon as it lands)
    #[serde(with = "millis")]
    pub stale_time: Duration,
    /// Default GC time for unobserved entries (default: 5 minutes)
    #[serde(with = "millis")]
    pub gc_time: Duration,
    /// Interval between GC sweeps (default: 60 seconds)
    #[serde(with = "millis")]
    pub gc_interval: Duration,
    /// Default retry policy
    pub retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_millis(DEFAULT_STALE_TIME_MS),
            gc_time: Duration::from_millis(DEFAULT_GC_TIME_MS),
            gc_interval: Duration::from_millis(DEFAULT_GC_INTERVAL_MS),
            retry: RetryPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Resolves the stale time for a query.
    pub fn stale_time_for(&self, options: &QueryOptions) -> Duration {
        options.stale_time.unwrap_or(self.stale_time)
    }

    /// Resolves the GC time for a query.
    pub fn gc_time_for(&self, options: &QueryOptions) -> Duration {
        options.gc_time.unwrap_or(self.gc_time)
    }

    /// Resolves the retry policy for a query.
    pub fn retry_for<'a>(&'a self, options: &'a QueryOptions) -> &'a RetryPolicy {
        options.retry.as_ref().unwrap_or(&self.retry)
    }
}

/// Durations are configured as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
