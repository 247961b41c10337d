// src/lib.rs
//! report-relay library: extracts a dataset from Oracle into a styled
//! spreadsheet and delivers it through a web mail UI.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `FailureKind`, `ValidationError`
//! - **Configuration**: `PipelineConfig`, `CommandLineInput`
//! - **Extraction**: `Extractor`, `DataSource`, `QueryResult`, `OracleSource`
//! - **Artifacts**: `Artifact`, `render`, `SheetLayout`
//! - **Delivery**: `DeliveryStage`, `BrowserLauncher`, `SuccessSignal`
//! - **Orchestration**: `Pipeline`, `PipelineRunOutcome`, `Diagnostics`

pub mod artifact;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod diagnostics;
pub mod error;
pub mod extraction;
pub mod orchestrator;
pub mod pipeline;
pub mod types;

// --- Error Handling ---
pub use crate::error::{AppError, FailureKind};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{CommandLineInput, PipelineConfig};

// --- Stages ---
pub use crate::artifact::Artifact;
pub use crate::delivery::{DeliveryReport, DeliveryStage, DeliveryState};
pub use crate::extraction::{Extractor, OracleSource, QueryResult};

// --- Pipeline Traits ---
pub use crate::pipeline::{ArtifactDelivery, ArtifactExtraction};

// --- Orchestration ---
pub use crate::diagnostics::{DiagnosticReport, Diagnostics};
pub use crate::orchestrator::{Pipeline, PipelineRunOutcome};
