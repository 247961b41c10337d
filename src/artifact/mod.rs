// src/artifact/mod.rs
//! Spreadsheet artifacts: naming, layout and writing.

mod layout;
mod paths;
mod workbook;

pub use layout::{column_width, SheetLayout};
pub use paths::{artifact_filename, artifact_path, ensure_output_dir};

use crate::error::AppError;
use crate::extraction::QueryResult;
use crate::types::SheetName;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A rendered spreadsheet, ready to be attached to a message.
///
/// The core never deletes artifacts; pruning old reports is left to the
/// operator's cleanup tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub sheet_name: SheetName,
    pub created_at: DateTime<Local>,
    pub row_count: usize,
}

impl Artifact {
    /// Filename without directories, as shown to recipients.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Renders `result` to `target` as one styled worksheet.
///
/// On error no file is left at `target`.
pub fn render(
    result: &QueryResult,
    target: &Path,
    sheet_name: &SheetName,
    created_at: DateTime<Local>,
) -> Result<Artifact, AppError> {
    let layout = SheetLayout::from_result(result);
    workbook::write_workbook(&layout, target, sheet_name)?;

    log::info!(
        "Saved {} row(s) to {} (sheet '{}')",
        result.row_count(),
        target.display(),
        sheet_name
    );

    Ok(Artifact {
        path: target.to_path_buf(),
        sheet_name: sheet_name.clone(),
        created_at,
        row_count: result.row_count(),
    })
}
