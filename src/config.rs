//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the task manager, its runners
//! and workers.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no worker semaphore created)
//! - `store_attempts <= 1` → store used as-is (no [`RetryStore`](crate::RetryStore) wrapper)
//! - `abort_poll_interval = 0s` → clamped to [`Config::MIN_POLL_INTERVAL`]
//! - task timeouts above [`Config::MAX_TIMEOUT`] are stored as `MAX_TIMEOUT`

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the task runtime.
///
/// ## Field semantics
/// - `abort_poll_interval`: how often an abort watcher reads its record
/// - `completion_poll_interval`: how often `wait_for_completion` re-reads the store
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `max_concurrent`: executions a [`Worker`](crate::Worker) runs at once (`0` = unlimited)
/// - `grace`: how long a stopping worker waits for in-flight executions
/// - `store_retry` / `store_attempts`: retry schedule for transient store failures
#[derive(Clone, Debug)]
pub struct Config {
    /// Poll period of the abort watcher.
    pub abort_poll_interval: Duration,

    /// Poll period of `wait_for_completion` (events short-circuit it).
    pub completion_poll_interval: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Subscribers that lag further than this observe `Lagged` and skip events.
    pub bus_capacity: usize,

    /// Maximum number of executions a worker runs concurrently.
    pub max_concurrent: usize,

    /// Maximum time a worker waits for in-flight executions on shutdown.
    pub grace: Duration,

    /// Backoff between store attempts.
    pub store_retry: BackoffPolicy,

    /// Attempts per store operation (including the first).
    pub store_attempts: u32,
}

impl Config {
    /// Lower bound applied to poll intervals.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Upper bound applied to task timeouts before they are stored (365 days).
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Returns the worker concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Abort watcher poll period, clamped to [`Config::MIN_POLL_INTERVAL`].
    #[inline]
    pub fn abort_poll_interval_clamped(&self) -> Duration {
        self.abort_poll_interval.max(Self::MIN_POLL_INTERVAL)
    }

    /// Completion poll period, clamped to [`Config::MIN_POLL_INTERVAL`].
    #[inline]
    pub fn completion_poll_interval_clamped(&self) -> Duration {
        self.completion_poll_interval.max(Self::MIN_POLL_INTERVAL)
    }

    /// True if store calls should go through a retrying adapter.
    #[inline]
    pub fn retries_store(&self) -> bool {
        self.store_attempts > 1
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `abort_poll_interval = 1s`
    /// - `completion_poll_interval = 1s`
    /// - `bus_capacity = 1024`
    /// - `max_concurrent = 0` (unlimited)
    /// - `grace = 60s`
    /// - `store_retry = BackoffPolicy::default()`, `store_attempts = 3`
    fn default() -> Self {
        Self {
            abort_poll_interval: Duration::from_secs(1),
            completion_poll_interval: Duration::from_secs(1),
            bus_capacity: 1024,
            max_concurrent: 0,
            grace: Duration::from_secs(60),
            store_retry: BackoffPolicy::default(),
            store_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.concurrency_limit(), None);
        assert!(cfg.retries_store());

        cfg.max_concurrent = 4;
        cfg.bus_capacity = 0;
        cfg.abort_poll_interval = Duration::ZERO;
        cfg.store_attempts = 1;
        assert_eq!(cfg.concurrency_limit(), Some(4));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.abort_poll_interval_clamped(), Config::MIN_POLL_INTERVAL);
        assert!(!cfg.retries_store());
    }
}
