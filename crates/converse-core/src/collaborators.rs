//! Collaborator seams
//!
//! The orchestrator treats everything beyond its own control flow as an
//! opaque collaborator behind a narrow async trait: remote intent
//! classification, response generation, data retrieval, background
//! context enrichment, and prior-message loading. Hosts inject concrete
//! implementations; tests inject scripted fakes.

use crate::classification::Classification;
use crate::error::CollaboratorError;
use crate::stream::ResponseBody;
use crate::types::{ChatMessage, ConversationId, Request};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote intent classification. May fail or time out; the engine wraps
/// it with memoization and retry.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    /// Classify one user message
    async fn classify(&self, text: &str) -> Result<Classification, CollaboratorError>;
}

/// Lightweight response generation for the non-retrieval strategies.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce a greeting response
    async fn greeting(&self, request: &Request) -> Result<ResponseBody, CollaboratorError>;

    /// Produce a summarize/other response from classification and history
    async fn summary(
        &self,
        request: &Request,
        classification: &Classification,
    ) -> Result<ResponseBody, CollaboratorError>;
}

/// Data retrieval: schema lookup plus query/answer generation over the
/// connected sources. The slow path.
#[async_trait]
pub trait DataRetriever: Send + Sync {
    /// Retrieve and stream an answer for a data question
    async fn retrieve(
        &self,
        request: &Request,
        classification: &Classification,
    ) -> Result<ResponseBody, CollaboratorError>;
}

/// Best-effort background context enrichment (e.g. refining the business
/// vocabulary of a data source). Never blocks a response; its failure is
/// logged and swallowed by the caller.
#[async_trait]
pub trait ContextEnricher: Send + Sync {
    /// Run one enrichment pass for the request's conversation
    async fn enrich(&self, request: &Request) -> Result<(), CollaboratorError>;
}

/// Prior-message persistence, read once per conversation at context load.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load the stored history of a conversation
    async fn load_history(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<ChatMessage>, CollaboratorError>;
}

/// The full set of injected collaborators
#[derive(Clone)]
pub struct Collaborators {
    /// Remote intent classification
    pub classifier: Arc<dyn RemoteClassifier>,
    /// Greeting / summarize generation
    pub generator: Arc<dyn ResponseGenerator>,
    /// Data retrieval
    pub retriever: Arc<dyn DataRetriever>,
    /// Background enrichment
    pub enricher: Arc<dyn ContextEnricher>,
    /// Prior-message loading
    pub messages: Arc<dyn MessageStore>,
}

impl Collaborators {
    /// Bundle the five collaborator implementations
    #[must_use]
    pub fn new(
        classifier: Arc<dyn RemoteClassifier>,
        generator: Arc<dyn ResponseGenerator>,
        retriever: Arc<dyn DataRetriever>,
        enricher: Arc<dyn ContextEnricher>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            classifier,
            generator,
            retriever,
            enricher,
            messages,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
