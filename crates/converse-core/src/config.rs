//! Configuration for the engine and the session pool
//!
//! Plain structs with defaults carrying every timing and retry policy
//! constant. Nothing here is read from the environment; hosts construct
//! and inject these.

use std::time::Duration;

/// Retry policy for transient remote failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts before terminal failure
    pub max_attempts: u32,
    /// Base backoff delay; attempt `n` (0-based) sleeps `base * 2^n`
    pub base_delay: Duration,
    /// Per-attempt timeout, if any
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Create a policy with no per-attempt timeout
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            attempt_timeout: None,
        }
    }

    /// With a per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Backoff delay after the given 0-based attempt: 1s, 2s, 4s, ...
    #[inline]
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Engine configuration: classification, strategy, and delivery timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-attempt timeout of a remote classification call
    pub classify_attempt_timeout: Duration,
    /// TTL of the classification memo cache
    pub classify_cache_ttl: Duration,
    /// Capacity of the classification memo cache
    pub classify_cache_capacity: u64,
    /// Retry policy applied to classification and data retrieval
    pub retry: RetryPolicy,
    /// End-to-end ceiling of the data-retrieval branch
    pub retrieval_timeout: Duration,
    /// Global ceiling of one `handle` call
    pub handle_timeout: Duration,
    /// Depth of the per-conversation event queue
    pub event_queue_depth: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With classification cache TTL
    #[inline]
    #[must_use]
    pub fn with_classify_cache_ttl(mut self, ttl: Duration) -> Self {
        self.classify_cache_ttl = ttl;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With data-retrieval ceiling
    #[inline]
    #[must_use]
    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    /// With global handle ceiling
    #[inline]
    #[must_use]
    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classify_attempt_timeout: Duration::from_secs(30),
            classify_cache_ttl: Duration::from_secs(60),
            classify_cache_capacity: 10_000,
            retry: RetryPolicy::default(),
            retrieval_timeout: Duration::from_secs(120),
            handle_timeout: Duration::from_secs(120),
            event_queue_depth: 16,
        }
    }
}

/// Session pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Interval of the idle-eviction sweep
    pub sweep_interval: Duration,
    /// Inactivity window after which a session is evicted
    pub idle_timeout: Duration,
}

impl PoolConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With sweep interval
    #[inline]
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// With inactivity window
    #[inline]
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn engine_defaults_match_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.classify_attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.classify_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retrieval_timeout, Duration::from_secs(120));
        assert_eq!(config.handle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn pool_defaults_match_policy() {
        let config = PoolConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn builders_override_fields() {
        let config = EngineConfig::new()
            .with_handle_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10)));

        assert_eq!(config.handle_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 2);
    }
}
