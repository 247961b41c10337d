// src/error.rs
//! Application error types with structured error handling.
//!
//! Error types form the vocabulary for failure modes in the system. The
//! first five variants of [`AppError`] are the pipeline's own failure kinds;
//! the rest cover configuration and plumbing.

use crate::delivery::DeliveryState;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Serializable classification of a failure, carried in run outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Source unreachable or credentials rejected
    Connection,
    /// Statement execution failed
    Query,
    /// Artifact could not be written
    Render,
    /// Browser, driver or session failure
    Automation,
    /// A delivery step did not reach its expected marker in time
    StepFailure,
    /// Configuration could not be resolved
    Configuration,
    /// Anything else, including panics caught at the orchestrator boundary
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Query => "query",
            Self::Render => "render",
            Self::Automation => "automation",
            Self::StepFailure => "step_failure",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Could not write artifact {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    #[error("Browser automation failed: {message}")]
    Automation { message: String },

    #[error("Delivery step failed in state {state}: {reason}")]
    StepFailure { state: DeliveryState, reason: String },

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Could not parse configuration file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template render error for template {name}: {message}")]
    TemplateRenderError { name: String, message: String },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Validation(#[from] crate::types::ValidationError),
}

impl AppError {
    /// Classifies the error for outcome reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connection { .. } => FailureKind::Connection,
            Self::Query { .. } => FailureKind::Query,
            Self::Render { .. } => FailureKind::Render,
            Self::Automation { .. } => FailureKind::Automation,
            Self::StepFailure { .. } => FailureKind::StepFailure,
            Self::MissingConfiguration(_) | Self::ConfigParse { .. } | Self::Validation(_) => {
                FailureKind::Configuration
            }
            Self::Io(_) | Self::TemplateRenderError { .. } | Self::InternalError { .. } => {
                FailureKind::Internal
            }
        }
    }

    pub fn automation(message: impl fmt::Display) -> Self {
        Self::Automation {
            message: message.to_string(),
        }
    }

    pub fn step_failure(state: DeliveryState, reason: impl Into<String>) -> Self {
        Self::StepFailure {
            state,
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        let message = if err.is_panic() {
            "stage panicked".to_string()
        } else {
            "stage task was cancelled".to_string()
        };
        AppError::InternalError {
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
