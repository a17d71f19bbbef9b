//! Converse Engine
//!
//! The conversational request orchestrator:
//! - Memoizing classifier wrapper over the remote intent classifier
//! - Retry/backoff supervisor for transient remote failures
//! - Intent router and the three response strategies
//! - The per-conversation orchestrator state machine with preemption and
//!   result correlation
//!
//! # Example
//!
//! ```rust,ignore
//! use converse_core::{EngineConfig, Request};
//! use converse_engine::Orchestrator;
//!
//! # async fn example(collaborators: converse_core::Collaborators) {
//! let orchestrator = Orchestrator::spawn(
//!     "conv-1".into(),
//!     "gpt-x".into(),
//!     collaborators,
//!     EngineConfig::default(),
//! )
//! .await;
//!
//! match orchestrator.handle(Request::new("conv-1", "gpt-x", "hi")).await {
//!     Ok(stream) => drop(stream.into_body()),
//!     Err(error) => eprintln!("request failed: {error}"),
//! }
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod classifier;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod router;
pub mod strategy;

// Re-exports for convenience
pub use classifier::{ClassifyOutcome, MemoClassifier};
pub use context::{Phase, Snapshot};
pub use error::{EngineError, RetryExhausted};
pub use orchestrator::Orchestrator;
pub use retry::{run_with_retry, Attempted};
pub use router::route;
pub use strategy::{StrategyKind, StrategyOutput};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the Converse engine
    pub use crate::{
        EngineError, MemoClassifier, Orchestrator, Phase, Snapshot, StrategyKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
