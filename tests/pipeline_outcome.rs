//! Orchestrator verdicts across stage successes, failures and panics.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use common::{default_signals, delivery_stage, extraction_request, id_name_result, FakeMailUi, MemorySource, SourceScript, UiScript};
use pretty_assertions::assert_eq;
use report_relay::artifact::Artifact;
use report_relay::delivery::{DeliveryMachine, DeliveryReport, DeliveryState, MessageComposer, MessageTemplates};
use report_relay::extraction::Extractor;
use report_relay::orchestrator::{Stage, StageStatus};
use report_relay::pipeline::{ArtifactDelivery, DatabaseExtraction, MailDelivery};
use report_relay::types::RecipientList;
use report_relay::{FailureKind, Pipeline};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts invocations and always reports a delivered message.
#[derive(Default)]
struct CountingDelivery {
    calls: AtomicUsize,
}

#[async_trait]
impl ArtifactDelivery for CountingDelivery {
    async fn deliver(&self, _artifact: &Artifact, _composed_at: DateTime<Local>) -> DeliveryReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut machine = DeliveryMachine::new();
        while machine.state() != DeliveryState::Delivered {
            machine.advance();
        }
        machine.finish()
    }
}

struct PanickingDelivery;

#[async_trait]
impl ArtifactDelivery for PanickingDelivery {
    async fn deliver(&self, _artifact: &Artifact, _composed_at: DateTime<Local>) -> DeliveryReport {
        panic!("delivery adapter bug")
    }
}

fn database_extraction(source: Arc<MemorySource>, dir: &Path) -> Arc<DatabaseExtraction> {
    Arc::new(DatabaseExtraction::new(
        Extractor::new(source),
        extraction_request(dir, "daily"),
    ))
}

fn mail_delivery(ui: Arc<FakeMailUi>) -> Arc<MailDelivery> {
    let composer = MessageComposer::new(&MessageTemplates::default(), "数据报表").unwrap();
    Arc::new(MailDelivery::new(
        delivery_stage(ui, default_signals()),
        composer,
        RecipientList::new(vec!["user1".into(), "user2".into()]).unwrap(),
    ))
}

#[tokio::test]
async fn test_extraction_failure_never_invokes_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::RefuseConnection);
    let delivery = Arc::new(CountingDelivery::default());

    let outcome = Pipeline::new(database_extraction(source.clone(), dir.path()), delivery.clone())
        .execute()
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.stage_reached, Stage::Extraction);
    assert_eq!(outcome.extraction, StageStatus::Failed);
    assert_eq!(outcome.delivery, StageStatus::NotRun);
    assert_eq!(outcome.artifact, None);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Connection);
    assert_eq!(failure.step, "connect");
    assert_eq!(delivery.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_query_failure_closes_session_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::FailQuery("ORA-00942: table or view does not exist"));
    let delivery = Arc::new(CountingDelivery::default());

    let outcome = Pipeline::new(database_extraction(source.clone(), dir.path()), delivery.clone())
        .execute()
        .await;

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Query);
    assert!(failure.message.contains("ORA-00942"));
    assert_eq!(source.counters.closes(), 1);
    assert_eq!(delivery.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_full_run_extracts_and_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::Rows(id_name_result()));
    let ui = FakeMailUi::new(UiScript::default());

    let outcome = Pipeline::new(database_extraction(source.clone(), dir.path()), mail_delivery(ui.clone()))
        .execute()
        .await;

    assert!(outcome.success, "{:?}", outcome.failure);
    assert_eq!(outcome.stage_reached, Stage::Delivery);
    assert_eq!(outcome.extraction, StageStatus::Succeeded);
    assert_eq!(outcome.delivery, StageStatus::Succeeded);
    assert_eq!(outcome.delivery_state, Some(DeliveryState::Delivered));

    let artifact = outcome.artifact.clone().unwrap();
    assert!(artifact.exists());
    assert_eq!(ui.state.lock().unwrap().attached, vec![artifact]);

    let steps: Vec<&str> = outcome.trace.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(
        steps,
        vec![
            "connect",
            "query",
            "render",
            "SESSION_READY",
            "AUTHENTICATED",
            "COMPOSER_OPEN",
            "CONTENT_FILLED",
            "SUBMITTED",
            "DELIVERED",
        ]
    );
    assert!(outcome.finished_at >= outcome.started_at);
    assert_eq!(source.counters.closes(), 1);
    assert_eq!(ui.quits(), 1);
}

#[tokio::test]
async fn test_delivery_failure_is_reported_with_its_state() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::Rows(id_name_result()));
    let ui = FakeMailUi::new(UiScript {
        after_send: None,
        ..UiScript::default()
    });

    let outcome = Pipeline::new(database_extraction(source, dir.path()), mail_delivery(ui.clone()))
        .execute()
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.stage_reached, Stage::Delivery);
    assert_eq!(outcome.extraction, StageStatus::Succeeded);
    assert_eq!(outcome.delivery, StageStatus::Failed);
    assert_eq!(outcome.delivery_state, Some(DeliveryState::Failed));
    assert!(outcome.artifact.unwrap().exists());
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.step, "SUBMITTED");
    assert_eq!(failure.kind, FailureKind::StepFailure);
    assert_eq!(ui.quits(), 1);
}

#[tokio::test]
async fn test_panic_during_extraction_becomes_internal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::PanicInQuery);
    let delivery = Arc::new(CountingDelivery::default());

    let outcome = Pipeline::new(database_extraction(source.clone(), dir.path()), delivery.clone())
        .execute()
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.stage_reached, Stage::Extraction);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Internal);
    assert!(failure.message.contains("driver returned garbage"));
    assert_eq!(source.counters.closes(), 1);
    assert_eq!(delivery.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panic_during_delivery_becomes_internal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::Rows(id_name_result()));

    let outcome = Pipeline::new(database_extraction(source, dir.path()), Arc::new(PanickingDelivery))
        .execute()
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.stage_reached, Stage::Delivery);
    assert_eq!(outcome.delivery, StageStatus::Failed);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Internal);
    assert!(failure.message.contains("delivery adapter bug"));
}

#[tokio::test]
async fn test_each_execute_is_a_fresh_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::Rows(id_name_result()));
    let delivery = Arc::new(CountingDelivery::default());
    let pipeline = Pipeline::new(database_extraction(source.clone(), dir.path()), delivery.clone());

    let first = pipeline.execute().await;
    let second = pipeline.execute().await;

    assert!(first.success && second.success);
    assert_ne!(first.artifact, second.artifact);
    assert_eq!(source.counters.connects(), 2);
    assert_eq!(source.counters.closes(), 2);
    assert_eq!(delivery.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_extract_only_skips_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::Rows(id_name_result()));
    let delivery = Arc::new(CountingDelivery::default());

    let outcome = Pipeline::new(database_extraction(source, dir.path()), delivery.clone())
        .extract_only()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.delivery, StageStatus::NotRun);
    assert_eq!(outcome.delivery_state, None);
    assert_eq!(delivery.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_outcome_json_names_stage_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new(SourceScript::RefuseConnection);
    let outcome = Pipeline::new(
        database_extraction(source, dir.path()),
        Arc::new(CountingDelivery::default()),
    )
    .execute()
    .await;

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["stage_reached"], "EXTRACTION");
    assert_eq!(json["extraction"], "failed");
    assert_eq!(json["failure"]["kind"], "connection");
    assert_eq!(json["failure"]["step"], "connect");
    assert_eq!(json["trace"][0]["succeeded"], false);
}
