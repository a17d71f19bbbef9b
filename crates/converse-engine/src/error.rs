//! Error types for the Converse engine
//!
//! The taxonomy the orchestrator exposes to callers:
//! - `Preempted` / `Stopped` - lifecycle outcomes, not remote failures
//! - `Strategy` / `StrategyTimeout` - request-fatal execution failures
//! - `HandleTimeout` - the global ceiling, with diagnostics attached
//! - `Classification` - non-degradable classification failure
//!
//! Stale results are never an error; they are discarded silently by the
//! correlation check.

use crate::context::Phase;
use crate::strategy::StrategyKind;
use converse_core::CollaboratorError;
use std::time::Duration;

/// Terminal failure of the retry supervisor
#[derive(Debug, Clone, thiserror::Error)]
#[error("retries exhausted after {attempts} attempts: {last}")]
pub struct RetryExhausted {
    /// Attempts performed before giving up
    pub attempts: u32,
    /// The failure of the final attempt
    pub last: CollaboratorError,
}

/// Engine-visible failure of one conversational request
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A newer input on the same conversation superseded this request
    #[error("request preempted by newer input")]
    Preempted,

    /// The conversation was torn down
    #[error("conversation stopped")]
    Stopped,

    /// Classification failed in a non-degradable way
    #[error("classification failed: {0}")]
    Classification(String),

    /// Strategy execution failed; fatal to this request only
    #[error("{strategy} strategy failed: {detail}")]
    Strategy {
        /// Strategy that failed
        strategy: StrategyKind,
        /// Failure detail
        detail: String,
    },

    /// The strategy branch exceeded its end-to-end ceiling
    #[error("{strategy} strategy timed out after {timeout:?}")]
    StrategyTimeout {
        /// Strategy that timed out
        strategy: StrategyKind,
        /// The ceiling that expired
        timeout: Duration,
    },

    /// The whole `handle` call exceeded its ceiling
    #[error("no response within {timeout:?} (last phase {phase:?} after {transitions} transitions)")]
    HandleTimeout {
        /// The ceiling that expired
        timeout: Duration,
        /// Phase observed at expiry
        phase: Phase,
        /// State transitions observed at expiry
        transitions: u64,
    },
}

impl EngineError {
    /// Whether this is the explicit preemption indication
    #[inline]
    #[must_use]
    pub fn is_preemption(&self) -> bool {
        matches!(self, Self::Preempted)
    }

    /// Whether this is one of the timeout classes
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StrategyTimeout { .. } | Self::HandleTimeout { .. })
    }

    /// Whether the conversation can accept further requests after this
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_timeout_diagnostics() {
        let err = EngineError::HandleTimeout {
            timeout: Duration::from_secs(120),
            phase: Phase::Executing,
            transitions: 7,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("Executing"));
        assert!(rendered.contains('7'));
    }

    #[test]
    fn stopped_is_not_recoverable() {
        assert!(!EngineError::Stopped.is_recoverable());
        assert!(EngineError::Preempted.is_recoverable());
        assert!(EngineError::Strategy {
            strategy: StrategyKind::DataRetrieval,
            detail: "boom".into()
        }
        .is_recoverable());
    }

    #[test]
    fn retry_exhausted_display() {
        let err = RetryExhausted {
            attempts: 3,
            last: CollaboratorError::remote("502"),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("502"));
    }
}
