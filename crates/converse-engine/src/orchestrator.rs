//! Orchestrator state machine
//!
//! One actor task per conversation. Commands and pipeline events are
//! processed strictly in order, so no two transitions of the same
//! conversation ever run concurrently; the classify → route → execute
//! pipeline runs as a separate task tagged with the request epoch, and
//! its completion is folded back in as an event.
//!
//! Preemption: a new input while a pipeline is in flight resolves the
//! superseded caller with `Preempted`, aborts the superseded pipeline
//! task, and restarts the sequence for the new input. Completions from
//! aborted or outrun pipelines carry a stale epoch and are discarded, so
//! a caller can never receive a result produced for an earlier input.

use crate::classifier::MemoClassifier;
use crate::context::{OrchestratorContext, Phase, Snapshot};
use crate::error::EngineError;
use crate::router;
use crate::strategy;
use converse_core::{
    Classification, Collaborators, ConversationId, EngineConfig, ModelId, Request, ResponseStream,
};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

type Reply = oneshot::Sender<Result<ResponseStream, EngineError>>;

/// External commands of the conversation state machine
enum Command {
    /// A new user turn; preempts whatever is in flight
    UserInput { request: Request, reply: Reply },
    /// Tear the conversation down
    Stop,
}

/// Events reported by a running pipeline task
enum PipelineEvent {
    /// The pipeline moved to a new phase
    Advanced { epoch: u64, phase: Phase },
    /// The pipeline reached a terminal state
    Done {
        epoch: u64,
        outcome: Result<PipelineOutput, EngineError>,
    },
}

/// What a completed pipeline hands back to the actor
struct PipelineOutput {
    classification: Classification,
    attempts: u32,
    stream: ResponseStream,
}

/// Handle to one conversation's orchestrator.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping
/// the last handle tears the actor down as if `stop` had been called.
pub struct Orchestrator {
    conversation: ConversationId,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    handle_timeout: Duration,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Construct the orchestrator for a conversation.
    ///
    /// Performs the context load (hydrating prior message history) before
    /// the actor starts accepting input. A failed history load degrades
    /// to an empty history; the conversation stays serviceable.
    pub async fn spawn(
        conversation: ConversationId,
        model: ModelId,
        collaborators: Collaborators,
        config: EngineConfig,
    ) -> Self {
        let history = match collaborators.messages.load_history(&conversation).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(
                    conversation = %conversation,
                    error = %error,
                    "history load failed; starting with empty history"
                );
                Vec::new()
            }
        };

        let ctx = OrchestratorContext::new(model, history);
        let (commands_tx, commands_rx) = mpsc::channel(config.event_queue_depth);
        let (pipeline_tx, pipeline_rx) = mpsc::channel(config.event_queue_depth);
        let (snapshot_tx, snapshot_rx) = watch::channel(ctx.snapshot());

        let actor = Actor {
            conversation: conversation.clone(),
            classifier: MemoClassifier::new(collaborators.classifier.clone(), &config),
            collaborators,
            config,
            ctx,
            pipeline_events: pipeline_tx,
            snapshot: snapshot_tx,
            pipeline: None,
            reply: None,
        };
        let task = tokio::spawn(actor.run(commands_rx, pipeline_rx));

        Self {
            conversation,
            commands: commands_tx,
            snapshot: snapshot_rx,
            handle_timeout: config.handle_timeout,
            actor: Mutex::new(Some(task)),
        }
    }

    /// Submit one user turn and await its correlated streaming response.
    ///
    /// Resolves exactly once: with the response stream produced for this
    /// exact input, or with the error that ended the request. Bounded by
    /// the global handle ceiling; on expiry the error carries the last
    /// observed phase and transition count.
    ///
    /// # Errors
    /// `Preempted` when a newer input superseded this request, `Stopped`
    /// after teardown, `Strategy`/`StrategyTimeout` on execution failure,
    /// `HandleTimeout` on ceiling expiry.
    pub async fn handle(&self, request: Request) -> Result<ResponseStream, EngineError> {
        let input = request.input.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.commands
            .send(Command::UserInput {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Stopped)?;

        let outcome = match timeout(self.handle_timeout, reply_rx).await {
            Err(_) => {
                let snapshot = *self.snapshot.borrow();
                return Err(EngineError::HandleTimeout {
                    timeout: self.handle_timeout,
                    phase: snapshot.phase,
                    transitions: snapshot.transitions,
                });
            }
            // actor went away without answering
            Ok(Err(_)) => return Err(EngineError::Stopped),
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            // correlation check at the delivery boundary: a stream whose
            // origin is not this request's input is stale
            Ok(stream) if !stream.matches(&input) => Err(EngineError::Preempted),
            other => other,
        }
    }

    /// Tear the conversation down and wait for the actor to finish.
    /// Idempotent; pending callers resolve with `Stopped`.
    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
        let task = self.actor.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Current observable state
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.borrow()
    }

    /// Whether the conversation reached its terminal phase
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.snapshot().phase.is_terminal()
    }

    /// The conversation this orchestrator serves
    #[inline]
    #[must_use]
    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("conversation", &self.conversation)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// The actor owning one conversation's context
struct Actor {
    conversation: ConversationId,
    classifier: MemoClassifier,
    collaborators: Collaborators,
    config: EngineConfig,
    ctx: OrchestratorContext,
    pipeline_events: mpsc::Sender<PipelineEvent>,
    snapshot: watch::Sender<Snapshot>,
    pipeline: Option<JoinHandle<()>>,
    reply: Option<Reply>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut pipeline_events: mpsc::Receiver<PipelineEvent>,
    ) {
        self.set_phase(Phase::Idle);
        tracing::info!(conversation = %self.conversation, "conversation ready");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::UserInput { request, reply }) => {
                        self.on_user_input(request, reply);
                    }
                    // an explicit stop and a dropped handle tear down alike
                    Some(Command::Stop) | None => {
                        self.on_stop();
                        break;
                    }
                },
                Some(event) = pipeline_events.recv() => match event {
                    PipelineEvent::Advanced { epoch, phase } => {
                        self.on_pipeline_advanced(epoch, phase);
                    }
                    PipelineEvent::Done { epoch, outcome } => {
                        self.on_pipeline_done(epoch, outcome);
                    }
                },
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.ctx.phase = phase;
        self.ctx.transitions += 1;
        let _ = self.snapshot.send(self.ctx.snapshot());
    }

    fn on_user_input(&mut self, request: Request, reply: Reply) {
        if self.ctx.phase.is_terminal() {
            let _ = reply.send(Err(EngineError::Stopped));
            return;
        }

        // explicit preemption indication for the superseded caller
        if let Some(previous) = self.reply.take() {
            let _ = previous.send(Err(EngineError::Preempted));
        }
        // abort, not ignore: the superseded request's remote work is
        // cancelled with its task
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.abort();
        }

        self.ctx.begin_request(&request);
        tracing::info!(
            conversation = %self.conversation,
            request = %request.id,
            epoch = self.ctx.epoch,
            "request accepted"
        );
        self.reply = Some(reply);
        self.set_phase(Phase::Classifying);
        self.spawn_pipeline(request);
    }

    fn spawn_pipeline(&mut self, request: Request) {
        // requests without caller-provided history run on the hydrated one
        let request = if request.history.is_empty() {
            request.with_history(self.ctx.history.clone())
        } else {
            request
        };

        let epoch = self.ctx.epoch;
        let classifier = self.classifier.clone();
        let collaborators = self.collaborators.clone();
        let config = self.config;
        let events = self.pipeline_events.clone();

        self.pipeline = Some(tokio::spawn(async move {
            let outcome =
                run_pipeline(epoch, &request, &classifier, &collaborators, &config, &events).await;
            let _ = events.send(PipelineEvent::Done { epoch, outcome }).await;
        }));
    }

    fn on_pipeline_advanced(&mut self, epoch: u64, phase: Phase) {
        if epoch != self.ctx.epoch || self.ctx.phase.is_terminal() {
            return;
        }
        self.set_phase(phase);
    }

    fn on_pipeline_done(&mut self, epoch: u64, outcome: Result<PipelineOutput, EngineError>) {
        if epoch != self.ctx.epoch || self.ctx.phase.is_terminal() {
            tracing::debug!(
                conversation = %self.conversation,
                epoch,
                current_epoch = self.ctx.epoch,
                "discarding stale pipeline outcome"
            );
            return;
        }
        self.pipeline = None;

        match outcome {
            Ok(output) => {
                if !output.stream.matches(&self.ctx.input) {
                    tracing::warn!(
                        conversation = %self.conversation,
                        "discarding result whose origin does not match the active input"
                    );
                    return;
                }
                self.ctx.classification = Some(output.classification);
                self.ctx.attempts = output.attempts;
                self.set_phase(Phase::Streaming);

                match self.reply.take() {
                    Some(reply) => {
                        if let Err(unsent) = reply.send(Ok(output.stream)) {
                            // the caller gave up; park the stream until the
                            // next input invalidates it
                            if let Ok(stream) = unsent {
                                self.ctx.result = Some(stream);
                            }
                        }
                        // hand-off is the finish signal
                        self.set_phase(Phase::Idle);
                    }
                    None => {
                        self.ctx.result = Some(output.stream);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    conversation = %self.conversation,
                    error = %error,
                    "request failed"
                );
                self.ctx.error = Some(error.clone());
                if let Some(reply) = self.reply.take() {
                    let _ = reply.send(Err(error));
                }
                self.set_phase(Phase::Idle);
            }
        }
    }

    fn on_stop(&mut self) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(EngineError::Stopped));
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.abort();
        }
        self.ctx.result = None;
        self.set_phase(Phase::Stopped);
        tracing::info!(
            conversation = %self.conversation,
            transitions = self.ctx.transitions,
            "conversation stopped"
        );
    }
}

/// The classify → route → execute sequence for one request epoch
async fn run_pipeline(
    epoch: u64,
    request: &Request,
    classifier: &MemoClassifier,
    collaborators: &Collaborators,
    config: &EngineConfig,
    events: &mpsc::Sender<PipelineEvent>,
) -> Result<PipelineOutput, EngineError> {
    let classified = classifier.classify(&request.input).await;
    let classification = classified.classification;

    let _ = events
        .send(PipelineEvent::Advanced {
            epoch,
            phase: Phase::Routing,
        })
        .await;
    let kind = router::route(&classification);
    tracing::debug!(
        request = %request.id,
        intent = classification.intent.as_tag(),
        strategy = %kind,
        degraded = classified.degraded,
        "routed"
    );

    let _ = events
        .send(PipelineEvent::Advanced {
            epoch,
            phase: Phase::Executing,
        })
        .await;
    let output = strategy::execute(kind, request, &classification, collaborators, config).await?;

    Ok(PipelineOutput {
        classification,
        attempts: classified.attempts + output.attempts,
        stream: ResponseStream::new(request.input.clone(), output.body),
    })
}
