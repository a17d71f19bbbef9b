//! Converse Session Pool
//!
//! Per-conversation orchestrator lifecycle: single-flight construction on
//! first request, access-stamped reuse, periodic idle eviction, explicit
//! invalidation, and graceful shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use converse_core::{EngineConfig, PoolConfig, Request};
//! use converse_session::SessionPool;
//!
//! # async fn example(collaborators: converse_core::Collaborators) {
//! let pool = SessionPool::new(collaborators, EngineConfig::default(), PoolConfig::default());
//! pool.start();
//!
//! let orchestrator = pool.get_or_create(&"conv-1".into(), &"gpt-x".into()).await;
//! let stream = orchestrator
//!     .handle(Request::new("conv-1", "gpt-x", "hi"))
//!     .await;
//! # let _ = stream;
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod pool;

pub use pool::{PoolStats, SessionPool};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
