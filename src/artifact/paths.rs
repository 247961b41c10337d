// src/artifact/paths.rs
//! Filename generation for artifacts.
//!
//! Names are derived from the run's start time, so runs started in
//! different seconds never share a name.

use crate::constants::{ARTIFACT_TIMESTAMP_FORMAT, MAX_ARTIFACT_NAME_ATTEMPTS, PARTIAL_FILE_SUFFIX};
use crate::error::AppError;
use crate::types::{FileExtension, FilePrefix};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// `<prefix>_<YYYYMMDD_HHMMSS><ext>` for the given instant.
pub fn artifact_filename(prefix: &FilePrefix, extension: &FileExtension, at: DateTime<Local>) -> String {
    format!(
        "{}_{}{}",
        prefix.as_str(),
        at.format(ARTIFACT_TIMESTAMP_FORMAT),
        extension.as_str()
    )
}

/// Resolves the absolute path the artifact of a run started at `at` will be
/// written to, creating the output directory if needed.
///
/// A name already taken on disk gets a numeric suffix instead of being
/// overwritten.
pub fn artifact_path(
    output_dir: &Path,
    prefix: &FilePrefix,
    extension: &FileExtension,
    at: DateTime<Local>,
) -> Result<PathBuf, AppError> {
    ensure_output_dir(output_dir)?;

    let dir = output_dir.canonicalize().map_err(|e| AppError::Render {
        path: output_dir.to_path_buf(),
        message: format!("cannot resolve output directory: {}", e),
    })?;

    let filename = artifact_filename(prefix, extension, at);
    let unique = make_unique_filename(&dir, &filename)?;
    Ok(dir.join(unique))
}

/// Creates the output directory when it does not exist yet.
pub fn ensure_output_dir(output_dir: &Path) -> Result<(), AppError> {
    if output_dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(output_dir).map_err(|e| AppError::Render {
        path: output_dir.to_path_buf(),
        message: format!("cannot create output directory: {}", e),
    })?;
    log::info!("Created output directory: {}", output_dir.display());
    Ok(())
}

/// Scratch path a workbook is saved to before being renamed into place.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(PARTIAL_FILE_SUFFIX);
    target.with_file_name(name)
}

/// Generates a unique filename if the original already exists.
fn make_unique_filename(base_path: &Path, original: &str) -> Result<String, AppError> {
    if !base_path.join(original).exists() {
        return Ok(original.to_string());
    }

    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    let ext = Path::new(original)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("xlsx");

    for i in 1..=MAX_ARTIFACT_NAME_ATTEMPTS {
        let candidate = format!("{}_{}.{}", stem, i, ext);
        if !base_path.join(&candidate).exists() {
            log::warn!("{} already exists, writing {} instead", original, candidate);
            return Ok(candidate);
        }
    }

    Err(AppError::Render {
        path: base_path.join(original),
        message: format!(
            "no free artifact name after {} attempts",
            MAX_ARTIFACT_NAME_ATTEMPTS
        ),
    })
}
