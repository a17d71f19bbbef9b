//! Retry/backoff supervisor
//!
//! Generic policy applied wherever a remote call can fail transiently:
//! bounded attempt count, per-attempt timeout, exponential backoff after
//! every failed attempt (1s, 2s, 4s with the default policy), terminal
//! failure carrying the last attempt's error.

use crate::error::RetryExhausted;
use converse_core::{CollaboratorError, RetryPolicy};
use std::future::Future;
use tokio::time::{sleep, timeout};

/// A successful value together with the attempts spent producing it
#[derive(Debug, Clone, Copy)]
pub struct Attempted<T> {
    /// The produced value
    pub value: T,
    /// Attempts performed, including the successful one
    pub attempts: u32,
}

/// Run `op` under the retry policy.
///
/// `op` receives the 0-based attempt number. An attempt that exceeds the
/// policy's per-attempt timeout counts as a `CollaboratorError::Timeout`
/// failure. After every failed attempt the supervisor sleeps the backoff
/// delay for that attempt before retrying or reporting terminal failure.
///
/// # Errors
/// `RetryExhausted` once `max_attempts` attempts have failed.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<Attempted<T>, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut last = CollaboratorError::Unavailable("no attempts configured".to_string());

    for attempt in 0..policy.max_attempts {
        let outcome = match policy.attempt_timeout {
            Some(limit) => match timeout(limit, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::Timeout(limit)),
            },
            None => op(attempt).await,
        };

        match outcome {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(error) => {
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    ?delay,
                    error = %error,
                    "attempt failed; backing off"
                );
                last = error;
                sleep(delay).await;
            }
        }
    }

    Err(RetryExhausted {
        attempts: policy.max_attempts,
        last,
    })
}
