//! Memoizing classifier wrapper
//!
//! Wraps the remote intent classifier with a time-bounded cache keyed by
//! exact input text, so identical recent inputs skip re-classification.
//! Cache misses run the remote call under the retry supervisor; terminal
//! failure degrades to `Classification::fallback()` so a classifier
//! outage never blocks a request. Degraded results are not cached.

use crate::retry::run_with_retry;
use converse_core::{Classification, EngineConfig, RemoteClassifier, RetryPolicy};
use moka::future::Cache;
use std::sync::Arc;

/// A classification together with how it was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOutcome {
    /// The classification to act on
    pub classification: Classification,
    /// Remote attempts consumed (0 on a cache hit)
    pub attempts: u32,
    /// Whether the memo cache answered
    pub cache_hit: bool,
    /// Whether this is the degraded fallback after exhausted retries
    pub degraded: bool,
}

/// Memoizing wrapper around the remote intent classifier
#[derive(Clone)]
pub struct MemoClassifier {
    remote: Arc<dyn RemoteClassifier>,
    cache: Cache<String, Classification>,
    policy: RetryPolicy,
}

impl MemoClassifier {
    /// Create the wrapper from the engine configuration
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteClassifier>, config: &EngineConfig) -> Self {
        Self {
            remote,
            cache: Cache::builder()
                .max_capacity(config.classify_cache_capacity)
                .time_to_live(config.classify_cache_ttl)
                .build(),
            policy: config.retry.with_attempt_timeout(config.classify_attempt_timeout),
        }
    }

    /// Classify one input, consulting the memo cache first.
    ///
    /// Never fails: exhausted retries degrade to the fallback
    /// classification and the request proceeds.
    pub async fn classify(&self, text: &str) -> ClassifyOutcome {
        if let Some(cached) = self.cache.get(text).await {
            tracing::debug!(input = text, "classification cache hit");
            return ClassifyOutcome {
                classification: cached,
                attempts: 0,
                cache_hit: true,
                degraded: false,
            };
        }

        let remote = self.remote.clone();
        match run_with_retry(self.policy, "classify", |_| {
            let remote = remote.clone();
            async move { remote.classify(text).await }
        })
        .await
        {
            Ok(attempted) => {
                self.cache
                    .insert(text.to_string(), attempted.value)
                    .await;
                ClassifyOutcome {
                    classification: attempted.value,
                    attempts: attempted.attempts,
                    cache_hit: false,
                    degraded: false,
                }
            }
            Err(exhausted) => {
                tracing::warn!(
                    input = text,
                    attempts = exhausted.attempts,
                    error = %exhausted.last,
                    "classification exhausted retries; degrading to fallback"
                );
                ClassifyOutcome {
                    classification: Classification::fallback(),
                    attempts: exhausted.attempts,
                    cache_hit: false,
                    degraded: true,
                }
            }
        }
    }

    /// Approximate number of cached classifications
    #[inline]
    #[must_use]
    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}
