// src/extraction/mod.rs
//! Extraction stage: connect, run the configured statement, render the
//! result to a spreadsheet artifact.
//!
//! The database session only lives inside [`ScopedSession`], which closes it
//! exactly once whichever way the stage exits.

mod oracle_db;
mod source;

pub use oracle_db::OracleSource;
pub use source::{CellValue, ConnectionDescriptor, DataSource, QueryResult, SourceSession};

use crate::artifact::{self, Artifact};
use crate::error::AppError;
use crate::types::{FileExtension, FilePrefix, SheetName};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;

/// Steps of an extraction run, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStep {
    Connect,
    Query,
    Render,
    /// Handing the blocking work to a worker thread
    Dispatch,
}

impl ExtractionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Query => "query",
            Self::Render => "render",
            Self::Dispatch => "dispatch",
        }
    }
}

/// A session that is closed when the scope ends, unless it was already
/// released explicitly.
pub struct ScopedSession {
    inner: Option<Box<dyn SourceSession>>,
}

impl ScopedSession {
    /// Connects and wraps the resulting session.
    pub fn open(source: &dyn DataSource, descriptor: &ConnectionDescriptor) -> Result<Self, AppError> {
        let session = source.connect(descriptor)?;
        log::info!("Database session opened: {}", descriptor);
        Ok(Self {
            inner: Some(session),
        })
    }

    pub fn query(&mut self, statement: &str) -> Result<QueryResult, AppError> {
        match self.inner.as_mut() {
            Some(session) => session.query(statement),
            None => Err(AppError::internal("query on a released session")),
        }
    }

    /// Closes the session now and reports any close error.
    pub fn release(mut self) -> Result<(), AppError> {
        match self.inner.take() {
            Some(session) => {
                let result = session.close();
                log::info!("Database session closed");
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(session) = self.inner.take() {
            match session.close() {
                Ok(()) => log::info!("Database session closed"),
                Err(e) => log::warn!("Database session close failed: {}", e),
            }
        }
    }
}

/// Opens a session, hands it to `work`, and closes it on every path.
pub fn with_session<T>(
    source: &dyn DataSource,
    descriptor: &ConnectionDescriptor,
    work: impl FnOnce(&mut ScopedSession) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let mut session = ScopedSession::open(source, descriptor)?;
    let result = work(&mut session);
    if let Err(e) = session.release() {
        log::warn!("Ignoring session close failure: {}", e);
    }
    result
}

/// Inputs of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub descriptor: ConnectionDescriptor,
    pub statement: String,
    pub output_dir: PathBuf,
    pub file_prefix: FilePrefix,
    pub extension: FileExtension,
    pub sheet_name: SheetName,
    pub started_at: DateTime<Local>,
}

/// A failed extraction, labelled with the step that failed.
#[derive(Debug)]
pub struct ExtractionFailure {
    pub step: ExtractionStep,
    pub error: AppError,
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.step.as_str(), self.error)
    }
}

/// Runs the extraction stage against a [`DataSource`].
#[derive(Clone)]
pub struct Extractor {
    source: Arc<dyn DataSource>,
}

impl Extractor {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// connect → query → release → render. Blocking.
    pub fn run(&self, request: &ExtractionRequest) -> Result<Artifact, ExtractionFailure> {
        log::info!("Extraction started");

        let mut session = ScopedSession::open(self.source.as_ref(), &request.descriptor)
            .map_err(|error| Self::fail(ExtractionStep::Connect, error))?;

        let result = session
            .query(&request.statement)
            .map_err(|error| Self::fail(ExtractionStep::Query, error))?;
        log::info!("Query returned {} row(s)", result.row_count());

        if let Err(e) = session.release() {
            log::warn!("Ignoring session close failure: {}", e);
        }

        let target = artifact::artifact_path(
            &request.output_dir,
            &request.file_prefix,
            &request.extension,
            request.started_at,
        )
        .map_err(|error| Self::fail(ExtractionStep::Render, error))?;

        let artifact = artifact::render(&result, &target, &request.sheet_name, request.started_at)
            .map_err(|error| Self::fail(ExtractionStep::Render, error))?;

        log::info!("Extraction finished: {}", artifact.path.display());
        Ok(artifact)
    }

    /// Runs [`Extractor::run`] on tokio's blocking pool.
    ///
    /// A panic in the worker is resumed on the calling task.
    pub async fn run_blocking(&self, request: ExtractionRequest) -> Result<Artifact, ExtractionFailure> {
        let extractor = self.clone();
        match tokio::task::spawn_blocking(move || extractor.run(&request)).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => std::panic::resume_unwind(join_error.into_panic()),
            Err(join_error) => Err(Self::fail(ExtractionStep::Dispatch, join_error.into())),
        }
    }

    fn fail(step: ExtractionStep, error: AppError) -> ExtractionFailure {
        log::error!("Extraction {} failed: {}", step.as_str(), error);
        ExtractionFailure { step, error }
    }
}
