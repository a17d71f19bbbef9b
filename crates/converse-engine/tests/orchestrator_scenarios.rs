//! End-to-end orchestrator scenarios
//!
//! Drives the orchestrator through full requests with scripted
//! collaborators: routing per intent, degradation, retrieval failure and
//! recovery, preemption, ceilings, and teardown.

use converse_core::{
    ChatMessage, Classification, Collaborators, Complexity, EngineConfig, Intent,
};
use converse_engine::{EngineError, Orchestrator, Phase, StrategyKind};
use converse_test_utils::{
    init_tracing, request, FailingMessageStore, InMemoryMessageStore, RecordingEnricher,
    RetrieverOutcome, ScriptedClassifier, ScriptedRetriever, StaticGenerator, TestCollaborators,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_orchestrator(fakes: &TestCollaborators, config: EngineConfig) -> Orchestrator {
    Orchestrator::spawn("conv-1".into(), "model-test".into(), fakes.bundle(), config).await
}

fn read_data_classifier() -> ScriptedClassifier {
    ScriptedClassifier::always(Classification::new(
        Intent::ReadData,
        Complexity::Complex,
        true,
        true,
    ))
}

#[tokio::test]
async fn greeting_request_streams_and_returns_to_idle() {
    init_tracing();
    let fakes = TestCollaborators::new().with_classifier(ScriptedClassifier::always(
        Classification::of_intent(Intent::Greeting),
    ));
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    let stream = orchestrator.handle(request("conv-1", "hi")).await.unwrap();

    assert!(stream.matches("hi"));
    assert_eq!(stream.into_body().collect_text().await, "hello there!");
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
    assert_eq!(fakes.generator.greeting_calls(), 1);
    assert_eq!(fakes.generator.summary_calls(), 0);
}

#[tokio::test]
async fn repeated_identical_input_reuses_the_classification() {
    let fakes = TestCollaborators::new().with_classifier(ScriptedClassifier::always(
        Classification::of_intent(Intent::Greeting),
    ));
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    orchestrator.handle(request("conv-1", "hi")).await.unwrap();
    orchestrator.handle(request("conv-1", "hi")).await.unwrap();

    assert_eq!(fakes.classifier.calls(), 1);
    assert_eq!(fakes.generator.greeting_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn classifier_outage_degrades_to_the_summarize_path() {
    let fakes = TestCollaborators::new()
        .with_classifier(ScriptedClassifier::always_failing("classifier 503"));
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    let stream = orchestrator
        .handle(request("conv-1", "what changed last week"))
        .await
        .unwrap();

    assert_eq!(stream.into_body().collect_text().await, "here is a summary");
    assert_eq!(fakes.classifier.calls(), 3);
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
}

#[tokio::test]
async fn data_question_streams_the_retrieved_answer() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::always("42 units in the east region"));
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    let stream = orchestrator
        .handle(request("conv-1", "show me sales by region"))
        .await
        .unwrap();

    assert_eq!(
        stream.into_body().collect_text().await,
        "42 units in the east region"
    );
    tokio::task::yield_now().await;
    assert_eq!(fakes.enricher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retrieval_failure_is_fatal_to_the_request_only() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::scripted(vec![
            RetrieverOutcome::Fail("warehouse unreachable".into()),
            RetrieverOutcome::Fail("warehouse unreachable".into()),
            RetrieverOutcome::Fail("warehouse unreachable".into()),
            RetrieverOutcome::Reply("recovered".into()),
        ]));
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    let error = orchestrator
        .handle(request("conv-1", "show me sales"))
        .await
        .unwrap_err();
    match error {
        EngineError::Strategy { strategy, detail } => {
            assert_eq!(strategy, StrategyKind::DataRetrieval);
            assert!(detail.contains("warehouse unreachable"));
        }
        other => panic!("expected a strategy failure, got {other:?}"),
    }
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);

    // the conversation accepts and serves the next request
    let stream = orchestrator
        .handle(request("conv-1", "show me sales again"))
        .await
        .unwrap();
    assert_eq!(stream.into_body().collect_text().await, "recovered");
}

#[tokio::test(start_paused = true)]
async fn hung_retrieval_times_out_at_the_branch_ceiling() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::scripted(vec![RetrieverOutcome::Hang]));
    // keep the global ceiling out of the way so the branch ceiling fires
    let config = EngineConfig::default().with_handle_timeout(Duration::from_secs(300));
    let orchestrator = spawn_orchestrator(&fakes, config).await;

    let error = orchestrator
        .handle(request("conv-1", "show me sales"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        EngineError::StrategyTimeout {
            strategy: StrategyKind::DataRetrieval,
            timeout
        } if timeout == Duration::from_secs(120)
    ));
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn handle_ceiling_reports_last_phase_and_transition_count() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::scripted(vec![RetrieverOutcome::Hang]));
    let config = EngineConfig::default().with_handle_timeout(Duration::from_secs(5));
    let orchestrator = spawn_orchestrator(&fakes, config).await;

    let error = orchestrator
        .handle(request("conv-1", "show me sales"))
        .await
        .unwrap_err();

    match error {
        EngineError::HandleTimeout {
            timeout,
            phase,
            transitions,
        } => {
            assert_eq!(timeout, Duration::from_secs(5));
            assert_eq!(phase, Phase::Executing);
            assert!(transitions > 0);
        }
        other => panic!("expected a handle timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_second_input_preempts_the_first() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::scripted(vec![
            RetrieverOutcome::Hang,
            RetrieverOutcome::Reply("y is 2".into()),
        ]));
    let orchestrator = Arc::new(spawn_orchestrator(&fakes, EngineConfig::default()).await);

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("conv-1", "what is x")).await })
    };
    // let the first request reach its retrieval attempt
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = orchestrator
        .handle(request("conv-1", "what is y"))
        .await
        .unwrap();
    assert!(second.matches("what is y"));
    assert_eq!(second.into_body().collect_text().await, "y is 2");

    // the superseded caller gets the explicit preemption indication,
    // never the second request's answer
    let first = first.await.unwrap();
    assert!(matches!(first, Err(EngineError::Preempted)));
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_resolves_pending_requests_and_rejects_new_ones() {
    let fakes = TestCollaborators::new()
        .with_classifier(read_data_classifier())
        .with_retriever(ScriptedRetriever::scripted(vec![RetrieverOutcome::Hang]));
    let orchestrator = Arc::new(spawn_orchestrator(&fakes, EngineConfig::default()).await);

    let pending = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("conv-1", "what is x")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    orchestrator.stop().await;

    let pending = pending.await.unwrap();
    assert!(matches!(pending, Err(EngineError::Stopped)));
    assert!(orchestrator.is_stopped());

    let rejected = orchestrator
        .handle(request("conv-1", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(rejected, EngineError::Stopped));
}

#[tokio::test]
async fn prior_history_is_hydrated_once_at_construction() {
    let store = InMemoryMessageStore::new();
    store.insert(
        "conv-1".into(),
        vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ],
    );
    let fakes = TestCollaborators::new().with_messages(store);
    let orchestrator = spawn_orchestrator(&fakes, EngineConfig::default()).await;

    assert_eq!(fakes.messages.loads(), 1);

    let stream = orchestrator
        .handle(request("conv-1", "summarize that"))
        .await
        .unwrap();
    assert_eq!(stream.into_body().collect_text().await, "here is a summary");
    assert_eq!(fakes.messages.loads(), 1);
}

#[tokio::test]
async fn failed_history_load_still_serves_requests() {
    let collaborators = Collaborators::new(
        Arc::new(ScriptedClassifier::always(Classification::of_intent(
            Intent::Greeting,
        ))),
        Arc::new(StaticGenerator::new()),
        Arc::new(ScriptedRetriever::always("unused")),
        Arc::new(RecordingEnricher::new()),
        Arc::new(FailingMessageStore),
    );
    let orchestrator = Orchestrator::spawn(
        "conv-1".into(),
        "model-test".into(),
        collaborators,
        EngineConfig::default(),
    )
    .await;

    let stream = orchestrator.handle(request("conv-1", "hi")).await.unwrap();
    assert_eq!(stream.into_body().collect_text().await, "hello there!");
}
