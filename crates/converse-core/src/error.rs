//! Error types shared across the workspace
//!
//! Collaborator calls (remote classification, data retrieval, enrichment,
//! history loading) fail with `CollaboratorError`. Engine-level failure
//! taxonomy lives with the engine; this crate only defines what crosses
//! the collaborator seam.

use std::time::Duration;

/// Failure of an external collaborator call
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// Remote call returned an error
    #[error("remote call failed: {0}")]
    Remote(String),

    /// Call exceeded its per-attempt timeout
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Collaborator is not reachable at all
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl CollaboratorError {
    /// Shorthand for a remote failure
    #[inline]
    #[must_use]
    pub fn remote(detail: impl Into<String>) -> Self {
        Self::Remote(detail.into())
    }

    /// Whether this failure is worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = CollaboratorError::remote("503 from classifier");
        assert!(err.to_string().contains("503 from classifier"));
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(CollaboratorError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(CollaboratorError::remote("flaky").is_retryable());
        assert!(!CollaboratorError::Unavailable("gone".into()).is_retryable());
    }
}
