//! Converse Core - domain types and collaborator seams
//!
//! The shared vocabulary of the Converse workspace:
//! - Conversation / request / model identity and chat messages
//! - Closed intent classification enums
//! - Streaming response primitives with origin correlation
//! - Collaborator traits the orchestrator calls through
//! - Engine and pool configuration
//!
//! # Example
//!
//! ```rust
//! use converse_core::{Classification, Intent, Request};
//!
//! let request = Request::new("conv-1", "gpt-x", "show me sales by region");
//! let classification = Classification::of_intent(Intent::ReadData);
//!
//! assert!(classification.intent == Intent::ReadData);
//! assert_eq!(request.input, "show me sales by region");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod classification;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use classification::{Classification, Complexity, Intent};
pub use collaborators::{
    Collaborators, ContextEnricher, DataRetriever, MessageStore, RemoteClassifier,
    ResponseGenerator,
};
pub use config::{EngineConfig, PoolConfig, RetryPolicy};
pub use error::CollaboratorError;
pub use stream::{ResponseBody, ResponseStream, StreamChunk, StreamClosed, StreamWriter};
pub use types::{ChatMessage, ConversationId, ModelId, Request, RequestId, Role};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Converse Core
    pub use crate::{
        ChatMessage, Classification, Collaborators, Complexity, ConversationId, EngineConfig,
        Intent, ModelId, PoolConfig, Request, RequestId, ResponseBody, ResponseStream,
        RetryPolicy, Role, StreamChunk,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
