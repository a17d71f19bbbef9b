//! Response strategies
//!
//! Three mutually exclusive producers of a streaming response:
//! - Greeting: single lightweight generation, no retry
//! - Summarize: single generation from classification + history
//! - DataRetrieval: retried retrieval under an end-to-end ceiling, with a
//!   concurrent best-effort enrichment task that can never delay or fail
//!   the primary branch

use crate::error::EngineError;
use crate::retry::run_with_retry;
use converse_core::{Classification, Collaborators, EngineConfig, Request, ResponseBody};
use tokio::time::timeout;

/// One of the mutually exclusive response-generation paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Fast salutation path
    Greeting,
    /// Summarize / other path
    Summarize,
    /// Data question path
    DataRetrieval,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Greeting => "greeting",
            Self::Summarize => "summarize",
            Self::DataRetrieval => "data-retrieval",
        };
        write!(f, "{name}")
    }
}

/// A produced response body plus the remote attempts spent on it
#[derive(Debug)]
pub struct StrategyOutput {
    /// The streaming body
    pub body: ResponseBody,
    /// Remote attempts consumed by this strategy
    pub attempts: u32,
}

/// Execute the selected strategy.
///
/// # Errors
/// `EngineError::Strategy` on execution failure,
/// `EngineError::StrategyTimeout` when the data-retrieval ceiling expires.
/// Both are fatal to this request only.
pub async fn execute(
    kind: StrategyKind,
    request: &Request,
    classification: &Classification,
    collaborators: &Collaborators,
    config: &EngineConfig,
) -> Result<StrategyOutput, EngineError> {
    match kind {
        StrategyKind::Greeting => collaborators
            .generator
            .greeting(request)
            .await
            .map(|body| StrategyOutput { body, attempts: 1 })
            .map_err(|error| EngineError::Strategy {
                strategy: kind,
                detail: error.to_string(),
            }),
        StrategyKind::Summarize => collaborators
            .generator
            .summary(request, classification)
            .await
            .map(|body| StrategyOutput { body, attempts: 1 })
            .map_err(|error| EngineError::Strategy {
                strategy: kind,
                detail: error.to_string(),
            }),
        StrategyKind::DataRetrieval => {
            retrieve_with_enrichment(request, classification, collaborators, config).await
        }
    }
}

/// The composite data-retrieval strategy: retried primary branch under the
/// retrieval ceiling, enrichment fired off concurrently.
async fn retrieve_with_enrichment(
    request: &Request,
    classification: &Classification,
    collaborators: &Collaborators,
    config: &EngineConfig,
) -> Result<StrategyOutput, EngineError> {
    spawn_enrichment(request, collaborators);

    let retriever = collaborators.retriever.clone();
    let primary = run_with_retry(config.retry, "retrieve", |_| {
        let retriever = retriever.clone();
        async move { retriever.retrieve(request, classification).await }
    });

    match timeout(config.retrieval_timeout, primary).await {
        Err(_) => Err(EngineError::StrategyTimeout {
            strategy: StrategyKind::DataRetrieval,
            timeout: config.retrieval_timeout,
        }),
        Ok(Err(exhausted)) => Err(EngineError::Strategy {
            strategy: StrategyKind::DataRetrieval,
            detail: exhausted.to_string(),
        }),
        Ok(Ok(attempted)) => Ok(StrategyOutput {
            body: attempted.value,
            attempts: attempted.attempts,
        }),
    }
}

/// Fire off the background enrichment task. Not awaited and not aborted:
/// it is side-effect-only, and its failure is logged and swallowed.
fn spawn_enrichment(request: &Request, collaborators: &Collaborators) {
    let enricher = collaborators.enricher.clone();
    let request = request.clone();
    tokio::spawn(async move {
        if let Err(error) = enricher.enrich(&request).await {
            tracing::warn!(
                conversation = %request.conversation,
                error = %error,
                "context enrichment failed"
            );
        }
    });
}
