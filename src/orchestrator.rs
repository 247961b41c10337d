// src/orchestrator.rs
//! Sequences extraction and delivery into a single verdict.
//!
//! Extraction runs first; delivery only ever sees an artifact that was
//! written successfully. Stage errors, internal errors and panics all end up
//! in the same [`PipelineRunOutcome`] shape.

use crate::artifact::Artifact;
use crate::delivery::{DeliveryReport, DeliveryState};
use crate::error::{panic_message, FailureKind};
use crate::extraction::{ExtractionFailure, ExtractionStep};
use crate::pipeline::{ArtifactDelivery, ArtifactExtraction};
use chrono::{DateTime, Local};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

const EXTRACTION_STEPS: [ExtractionStep; 3] = [
    ExtractionStep::Connect,
    ExtractionStep::Query,
    ExtractionStep::Render,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Extraction,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    NotRun,
}

/// What went wrong, where.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub step: String,
    pub message: String,
}

/// One step of the run and whether it completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub stage: Stage,
    pub step: String,
    pub succeeded: bool,
}

/// The verdict of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRunOutcome {
    pub success: bool,
    pub stage_reached: Stage,
    pub extraction: StageStatus,
    pub delivery: StageStatus,
    pub artifact: Option<PathBuf>,
    pub delivery_state: Option<DeliveryState>,
    pub failure: Option<FailureDetail>,
    pub trace: Vec<TraceEntry>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl PipelineRunOutcome {
    fn begin(started_at: DateTime<Local>) -> Self {
        Self {
            success: false,
            stage_reached: Stage::Extraction,
            extraction: StageStatus::NotRun,
            delivery: StageStatus::NotRun,
            artifact: None,
            delivery_state: None,
            failure: None,
            trace: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    fn record(&mut self, stage: Stage, step: impl Into<String>, succeeded: bool) {
        self.trace.push(TraceEntry {
            stage,
            step: step.into(),
            succeeded,
        });
    }

    fn close(mut self, success: bool) -> Self {
        self.success = success;
        self.finished_at = Local::now();
        if success {
            log::info!("Pipeline run succeeded");
        } else if let Some(failure) = &self.failure {
            log::error!(
                "Pipeline run failed during {:?} at {}: {}",
                self.stage_reached,
                failure.step,
                failure.message
            );
        }
        self
    }
}

/// Runs the two stages in order with fail-fast semantics.
pub struct Pipeline {
    extraction: Arc<dyn ArtifactExtraction>,
    delivery: Arc<dyn ArtifactDelivery>,
}

impl Pipeline {
    pub fn new(extraction: Arc<dyn ArtifactExtraction>, delivery: Arc<dyn ArtifactDelivery>) -> Self {
        Self { extraction, delivery }
    }

    /// A full run: fresh extraction, then fresh delivery.
    pub async fn execute(&self) -> PipelineRunOutcome {
        let mut outcome = PipelineRunOutcome::begin(Local::now());
        log::info!("Pipeline run started");

        let artifact = match extract(self.extraction.as_ref(), &mut outcome).await {
            Some(artifact) => artifact,
            None => return outcome.close(false),
        };

        outcome.stage_reached = Stage::Delivery;
        let delivered = AssertUnwindSafe(self.delivery.deliver(&artifact, Local::now()))
            .catch_unwind()
            .await;

        match delivered {
            Ok(report) => {
                let success = apply_delivery(&mut outcome, &report);
                outcome.close(success)
            }
            Err(payload) => {
                outcome.delivery = StageStatus::Failed;
                outcome.delivery_state = Some(DeliveryState::Failed);
                outcome.record(Stage::Delivery, "delivery", false);
                outcome.failure = Some(panic_detail("delivery", payload.as_ref()));
                outcome.close(false)
            }
        }
    }

    /// Extraction only; delivery is reported as not run.
    pub async fn extract_only(&self) -> PipelineRunOutcome {
        let mut outcome = PipelineRunOutcome::begin(Local::now());
        let success = extract(self.extraction.as_ref(), &mut outcome).await.is_some();
        outcome.close(success)
    }
}

async fn extract(extraction: &dyn ArtifactExtraction, outcome: &mut PipelineRunOutcome) -> Option<Artifact> {
    let extracted = AssertUnwindSafe(extraction.extract(outcome.started_at))
        .catch_unwind()
        .await;

    match extracted {
        Ok(Ok(artifact)) => {
            for step in EXTRACTION_STEPS {
                outcome.record(Stage::Extraction, step.as_str(), true);
            }
            outcome.extraction = StageStatus::Succeeded;
            outcome.artifact = Some(artifact.path.clone());
            Some(artifact)
        }
        Ok(Err(failure)) => {
            apply_extraction_failure(outcome, &failure);
            None
        }
        Err(payload) => {
            outcome.extraction = StageStatus::Failed;
            outcome.record(Stage::Extraction, "extraction", false);
            outcome.failure = Some(panic_detail("extraction", payload.as_ref()));
            None
        }
    }
}

fn apply_extraction_failure(outcome: &mut PipelineRunOutcome, failure: &ExtractionFailure) {
    for step in EXTRACTION_STEPS.iter().take_while(|s| **s != failure.step) {
        outcome.record(Stage::Extraction, step.as_str(), true);
    }
    outcome.record(Stage::Extraction, failure.step.as_str(), false);
    outcome.extraction = StageStatus::Failed;
    outcome.failure = Some(FailureDetail {
        kind: failure.error.kind(),
        step: failure.step.as_str().to_string(),
        message: failure.error.to_string(),
    });
}

/// Copies the delivery report into the outcome; true when delivered.
fn apply_delivery(outcome: &mut PipelineRunOutcome, report: &DeliveryReport) -> bool {
    for state in report.visited.iter().skip(1) {
        if *state != DeliveryState::Failed {
            outcome.record(Stage::Delivery, state.as_str(), true);
        }
    }
    outcome.delivery_state = Some(report.terminal());

    match &report.failure {
        None => {
            outcome.delivery = StageStatus::Succeeded;
            true
        }
        Some(failure) => {
            outcome.record(Stage::Delivery, DeliveryState::Failed.as_str(), false);
            outcome.delivery = StageStatus::Failed;
            outcome.failure = Some(FailureDetail {
                kind: failure.kind,
                step: failure.failed_in.as_str().to_string(),
                message: failure.message.clone(),
            });
            false
        }
    }
}

fn panic_detail(step: &str, payload: &(dyn std::any::Any + Send)) -> FailureDetail {
    FailureDetail {
        kind: FailureKind::Internal,
        step: step.to_string(),
        message: format!("{} panicked: {}", step, panic_message(payload)),
    }
}
