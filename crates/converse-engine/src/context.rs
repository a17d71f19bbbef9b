//! Per-conversation orchestrator state
//!
//! `OrchestratorContext` is owned exclusively by the conversation's actor
//! task and mutated only by its own transition handling; strategies read
//! request data and return outputs that the actor folds back in.

use crate::error::EngineError;
use converse_core::{ChatMessage, Classification, ModelId, Request, ResponseStream};

/// Lifecycle phase of a conversation's orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Hydrating prior message history
    LoadContext,
    /// Awaiting input
    Idle,
    /// Running intent classification
    Classifying,
    /// Selecting a strategy
    Routing,
    /// Executing the selected strategy
    Executing,
    /// A result exists and is being handed to the caller
    Streaming,
    /// Terminal; the session has been torn down
    Stopped,
}

impl Phase {
    /// Whether no further events are processed in this phase
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Cheap observable state of one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase
    pub phase: Phase,
    /// Epoch of the active request (bumped per input)
    pub epoch: u64,
    /// Total state transitions since construction
    pub transitions: u64,
}

/// Mutable per-conversation state
#[derive(Debug)]
pub(crate) struct OrchestratorContext {
    /// Model of the active request
    pub model: ModelId,
    /// Input text of the active request
    pub input: String,
    /// Hydrated + caller-provided message history
    pub history: Vec<ChatMessage>,
    /// Classification of the active request, once known
    pub classification: Option<Classification>,
    /// Produced result awaiting a taker
    pub result: Option<ResponseStream>,
    /// Last request-fatal error
    pub error: Option<EngineError>,
    /// Remote attempts consumed by the active request
    pub attempts: u32,
    /// Active request epoch; completions from older epochs are stale
    pub epoch: u64,
    /// Transition counter for diagnostics
    pub transitions: u64,
    /// Current phase
    pub phase: Phase,
}

impl OrchestratorContext {
    pub(crate) fn new(model: ModelId, history: Vec<ChatMessage>) -> Self {
        Self {
            model,
            input: String::new(),
            history,
            classification: None,
            result: None,
            error: None,
            attempts: 0,
            epoch: 0,
            transitions: 0,
            phase: Phase::LoadContext,
        }
    }

    /// Record a new active request, invalidating whatever the previous
    /// one produced.
    pub(crate) fn begin_request(&mut self, request: &Request) {
        self.epoch += 1;
        self.input = request.input.clone();
        self.model = request.model.clone();
        if !request.history.is_empty() {
            self.history = request.history.clone();
        }
        self.classification = None;
        self.result = None;
        self.error = None;
        self.attempts = 0;
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            epoch: self.epoch,
            transitions: self.transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converse_core::Request;

    #[test]
    fn begin_request_resets_outcome_state() {
        let mut ctx = OrchestratorContext::new(ModelId::new("m"), Vec::new());
        ctx.error = Some(EngineError::Preempted);
        ctx.attempts = 3;

        let request = Request::new("c1", "m2", "hello");
        ctx.begin_request(&request);

        assert_eq!(ctx.epoch, 1);
        assert_eq!(ctx.input, "hello");
        assert_eq!(ctx.model.as_str(), "m2");
        assert!(ctx.error.is_none());
        assert!(ctx.result.is_none());
        assert_eq!(ctx.attempts, 0);
    }

    #[test]
    fn caller_history_replaces_hydrated_history() {
        let hydrated = vec![ChatMessage::user("old")];
        let mut ctx = OrchestratorContext::new(ModelId::new("m"), hydrated);

        // no caller history: hydrated history is kept
        ctx.begin_request(&Request::new("c1", "m", "first"));
        assert_eq!(ctx.history.len(), 1);

        // caller history wins when present
        let request = Request::new("c1", "m", "second")
            .with_history(vec![ChatMessage::user("a"), ChatMessage::assistant("b")]);
        ctx.begin_request(&request);
        assert_eq!(ctx.history.len(), 2);
    }

    #[test]
    fn only_stopped_is_terminal() {
        assert!(Phase::Stopped.is_terminal());
        for phase in [
            Phase::LoadContext,
            Phase::Idle,
            Phase::Classifying,
            Phase::Routing,
            Phase::Executing,
            Phase::Streaming,
        ] {
            assert!(!phase.is_terminal());
        }
    }
}
