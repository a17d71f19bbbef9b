//! Testing utilities for the Converse workspace
//!
//! Scripted collaborator fakes with call counters, plus shared fixtures.
//! Everything here is test support; `expect` is acceptable.

#![allow(missing_docs)]

use async_trait::async_trait;
use converse_core::{
    ChatMessage, Classification, CollaboratorError, Collaborators, ContextEnricher,
    ConversationId, DataRetriever, MessageStore, RemoteClassifier, Request, ResponseBody,
    ResponseGenerator,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Remote classifier driven by a script of outcomes.
///
/// Pops one scripted outcome per call; an exhausted script falls back to
/// the configured default, or fails if there is none.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Classification, CollaboratorError>>>,
    default: Option<Classification>,
    failure_detail: String,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    /// Every call returns the same classification
    pub fn always(classification: Classification) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Some(classification),
            failure_detail: "classifier down".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a retryable remote error
    pub fn always_failing(detail: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: None,
            failure_detail: detail.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Scripted outcomes, consumed in order; an exhausted script fails
    pub fn scripted(outcomes: Vec<Result<Classification, CollaboratorError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            default: None,
            failure_detail: "classifier script exhausted".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the remote was invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClassifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(outcome) = self.script.lock().expect("classifier script lock").pop_front() {
            return outcome;
        }
        match self.default {
            Some(classification) => Ok(classification),
            None => Err(CollaboratorError::remote(self.failure_detail.clone())),
        }
    }
}

/// One scripted data-retrieval outcome
#[derive(Debug, Clone)]
pub enum RetrieverOutcome {
    /// Succeed with a single-chunk answer
    Reply(String),
    /// Fail with a retryable remote error
    Fail(String),
    /// Never complete (until the calling task is aborted)
    Hang,
}

/// Data retriever driven by a script of outcomes.
pub struct ScriptedRetriever {
    script: Mutex<VecDeque<RetrieverOutcome>>,
    default: Option<RetrieverOutcome>,
    calls: AtomicUsize,
}

impl ScriptedRetriever {
    /// Every call succeeds with the same answer
    pub fn always(answer: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Some(RetrieverOutcome::Reply(answer.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a retryable remote error
    pub fn always_failing(detail: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Some(RetrieverOutcome::Fail(detail.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Scripted outcomes, consumed in order; an exhausted script fails
    pub fn scripted(outcomes: Vec<RetrieverOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            default: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of retrieval attempts observed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataRetriever for ScriptedRetriever {
    async fn retrieve(
        &self,
        _request: &Request,
        _classification: &Classification,
    ) -> Result<ResponseBody, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .expect("retriever script lock")
            .pop_front()
            .or_else(|| self.default.clone());
        match outcome {
            Some(RetrieverOutcome::Reply(answer)) => Ok(ResponseBody::from_text(answer)),
            Some(RetrieverOutcome::Fail(detail)) => Err(CollaboratorError::remote(detail)),
            Some(RetrieverOutcome::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            None => Err(CollaboratorError::remote("retriever script exhausted")),
        }
    }
}

/// Generator returning fixed greeting/summary texts, optionally failing.
pub struct StaticGenerator {
    greeting: String,
    summary: String,
    fail: bool,
    greeting_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl StaticGenerator {
    pub fn new() -> Self {
        Self {
            greeting: "hello there!".to_string(),
            summary: "here is a summary".to_string(),
            fail: false,
            greeting_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_texts(greeting: &str, summary: &str) -> Self {
        Self {
            greeting: greeting.to_string(),
            summary: summary.to_string(),
            ..Self::new()
        }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn greeting_calls(&self) -> usize {
        self.greeting_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseGenerator for StaticGenerator {
    async fn greeting(&self, _request: &Request) -> Result<ResponseBody, CollaboratorError> {
        self.greeting_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::remote("generator down"));
        }
        Ok(ResponseBody::from_text(self.greeting.clone()))
    }

    async fn summary(
        &self,
        _request: &Request,
        _classification: &Classification,
    ) -> Result<ResponseBody, CollaboratorError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::remote("generator down"));
        }
        Ok(ResponseBody::from_text(self.summary.clone()))
    }
}

/// Enricher that records invocations, optionally failing every call.
pub struct RecordingEnricher {
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingEnricher {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every enrichment pass fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for RecordingEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextEnricher for RecordingEnricher {
    async fn enrich(&self, _request: &Request) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::remote("enrichment failed"));
        }
        Ok(())
    }
}

/// In-memory message store with a load counter and an optional gate.
///
/// With a gate installed, every `load_history` call acquires one permit
/// first, which lets tests hold a construction in flight.
pub struct InMemoryMessageStore {
    histories: Mutex<HashMap<ConversationId, Vec<ChatMessage>>>,
    gate: Option<Arc<Semaphore>>,
    loads: AtomicUsize,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            gate: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// Gate every load on one permit of the given semaphore
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    /// Seed the stored history of a conversation
    pub fn insert(&self, conversation: ConversationId, history: Vec<ChatMessage>) {
        self.histories
            .lock()
            .expect("history lock")
            .insert(conversation, history);
    }

    /// Number of completed history loads
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn load_history(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<ChatMessage>, CollaboratorError> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("load gate closed");
            permit.forget();
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .histories
            .lock()
            .expect("history lock")
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }
}

/// Message store whose every load fails
pub struct FailingMessageStore;

#[async_trait]
impl MessageStore for FailingMessageStore {
    async fn load_history(
        &self,
        _conversation: &ConversationId,
    ) -> Result<Vec<ChatMessage>, CollaboratorError> {
        Err(CollaboratorError::Unavailable("message store down".into()))
    }
}

/// The concrete fake set behind a `Collaborators` bundle, kept around so
/// tests can inspect call counters after the fact.
pub struct TestCollaborators {
    pub classifier: Arc<ScriptedClassifier>,
    pub generator: Arc<StaticGenerator>,
    pub retriever: Arc<ScriptedRetriever>,
    pub enricher: Arc<RecordingEnricher>,
    pub messages: Arc<InMemoryMessageStore>,
}

impl TestCollaborators {
    /// Benign defaults: classify everything as `Other`, answer every
    /// retrieval, record enrichments, start with empty histories.
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(ScriptedClassifier::always(Classification::fallback())),
            generator: Arc::new(StaticGenerator::new()),
            retriever: Arc::new(ScriptedRetriever::always("data answer")),
            enricher: Arc::new(RecordingEnricher::new()),
            messages: Arc::new(InMemoryMessageStore::new()),
        }
    }

    pub fn with_classifier(mut self, classifier: ScriptedClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_generator(mut self, generator: StaticGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn with_retriever(mut self, retriever: ScriptedRetriever) -> Self {
        self.retriever = Arc::new(retriever);
        self
    }

    pub fn with_enricher(mut self, enricher: RecordingEnricher) -> Self {
        self.enricher = Arc::new(enricher);
        self
    }

    pub fn with_messages(mut self, messages: InMemoryMessageStore) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    /// Bundle for injection into the engine
    pub fn bundle(&self) -> Collaborators {
        Collaborators::new(
            self.classifier.clone(),
            self.generator.clone(),
            self.retriever.clone(),
            self.enricher.clone(),
            self.messages.clone(),
        )
    }
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

/// A request fixture with the test model
pub fn request(conversation: &str, input: &str) -> Request {
    Request::new(conversation, "model-test", input)
}

/// Install a fmt subscriber for test output; repeated calls are no-ops
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
