// src/pipeline.rs
//! Pipeline capability traits: abstract the two stages of a report run.
//!
//! Each trait describes a single capability, enabling testing each stage in
//! isolation and letting the orchestrator run against fakes.

use crate::artifact::Artifact;
use crate::delivery::{DeliveryMachine, DeliveryReport, DeliveryStage, MessageComposer};
use crate::extraction::{ExtractionFailure, ExtractionRequest, Extractor};
use crate::types::RecipientList;
use chrono::{DateTime, Local};

/// Produces the artifact for a run started at `started_at`.
#[async_trait::async_trait]
pub trait ArtifactExtraction: Send + Sync {
    async fn extract(&self, started_at: DateTime<Local>) -> Result<Artifact, ExtractionFailure>;
}

/// Delivers an artifact. Failures are reported in the returned
/// [`DeliveryReport`], never as an error.
#[async_trait::async_trait]
pub trait ArtifactDelivery: Send + Sync {
    async fn deliver(&self, artifact: &Artifact, composed_at: DateTime<Local>) -> DeliveryReport;
}

/// Database extraction on the blocking pool.
pub struct DatabaseExtraction {
    extractor: Extractor,
    request: ExtractionRequest,
}

impl DatabaseExtraction {
    /// `request.started_at` is replaced on every run.
    pub fn new(extractor: Extractor, request: ExtractionRequest) -> Self {
        Self { extractor, request }
    }
}

#[async_trait::async_trait]
impl ArtifactExtraction for DatabaseExtraction {
    async fn extract(&self, started_at: DateTime<Local>) -> Result<Artifact, ExtractionFailure> {
        let mut request = self.request.clone();
        request.started_at = started_at;
        self.extractor.run_blocking(request).await
    }
}

/// Web mail delivery of the artifact to a fixed recipient list.
pub struct MailDelivery {
    stage: DeliveryStage,
    composer: MessageComposer,
    recipients: RecipientList,
}

impl MailDelivery {
    pub fn new(stage: DeliveryStage, composer: MessageComposer, recipients: RecipientList) -> Self {
        Self {
            stage,
            composer,
            recipients,
        }
    }
}

#[async_trait::async_trait]
impl ArtifactDelivery for MailDelivery {
    async fn deliver(&self, artifact: &Artifact, composed_at: DateTime<Local>) -> DeliveryReport {
        match self
            .composer
            .compose(&self.recipients, Some(&artifact.path), composed_at)
        {
            Ok(message) => {
                log::info!(
                    "Delivering {} to {} recipient(s)",
                    artifact.file_name(),
                    self.recipients.count()
                );
                self.stage.run(&message).await
            }
            Err(e) => DeliveryMachine::new().fail(&e),
        }
    }
}
