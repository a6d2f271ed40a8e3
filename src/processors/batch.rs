//! Batch repair driver.
//!
//! Walks an input tree for recording files, mirrors the relative layout
//! under the output tree, and runs the classify-then-correct pipeline per
//! file. Files whose output already exists are skipped, which makes re-runs
//! idempotent; the first per-file failure aborts the whole run. Processing
//! is strictly sequential and no state is shared between files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::core::records::RECORDING_EXTENSION;

use super::classifier::{classify_file, Verdict};
use super::correction::{correct_file, CorrectionStats};

/// Errors specific to batch orchestration.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input and output resolve to the same location: {path}")]
    PathCollision { path: PathBuf },

    #[error("Input path not found: {0}")]
    NotFound(PathBuf),
}

/// What the pipeline did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Already-correct file, duplicated byte-for-byte.
    Copied,
    /// Defective file, rewritten through the correction engine.
    Rewritten(CorrectionStats),
}

/// Per-file pipeline result.
#[derive(Debug, Clone, Copy)]
pub struct FileReport {
    pub verdict: Verdict,
    pub outcome: FileOutcome,
}

/// Totals for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Recording files found under the input tree.
    pub files_found: u64,
    /// Files skipped because their output already existed.
    pub files_skipped: u64,
    /// Clean files copied byte-for-byte.
    pub files_copied: u64,
    /// Defective files rewritten.
    pub files_rewritten: u64,
}

/// Best-effort absolute form of a path, for collision comparison.
fn resolved(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Refuse to run when input and output are the same location.
///
/// In-place correction is unsupported; this check runs before any file is
/// touched.
pub fn check_distinct_paths(input: &Path, output: &Path) -> std::result::Result<(), BatchError> {
    let resolved_input = resolved(input);
    if resolved_input == resolved(output) {
        return Err(BatchError::PathCollision {
            path: resolved_input,
        });
    }
    Ok(())
}

/// Recursively collect recording files under `root`, sorted by path.
pub fn find_recordings(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case(RECORDING_EXTENSION))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

/// Run the classify-then-correct pipeline for a single file.
///
/// A file with a clean verdict is copied byte-for-byte; re-encoding it would
/// only cost time and single-precision round-trips. Defective files go
/// through the correction engine.
pub fn repair_file(input: &Path, output: &Path, config: &PipelineConfig) -> Result<FileReport> {
    let verdict = classify_file(input, &config.classifier)
        .with_context(|| format!("Failed to classify {}", input.display()))?;

    let outcome = if verdict.is_fine() {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory {}", parent.display())
            })?;
        }
        fs::copy(input, output).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                input.display(),
                output.display()
            )
        })?;
        info!("{}: clean, copied verbatim", input.display());
        FileOutcome::Copied
    } else {
        let stats = correct_file(input, output, verdict, &config.correction)?;
        info!(
            "{}: corrected ({} of {} records kept)",
            input.display(),
            stats.records_written,
            stats.records_read
        );
        FileOutcome::Rewritten(stats)
    };

    Ok(FileReport { verdict, outcome })
}

/// Repair every recording under `input_dir` into `output_dir`.
///
/// Outputs keep the input's relative paths. Existing outputs are skipped so
/// an interrupted run can be resumed by re-invoking it; any per-file failure
/// aborts the run immediately.
pub fn repair_tree(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<BatchSummary> {
    if !input_dir.exists() {
        return Err(BatchError::NotFound(input_dir.to_path_buf()).into());
    }
    check_distinct_paths(input_dir, output_dir)?;

    let files = find_recordings(input_dir);
    if files.is_empty() {
        warn!(
            "No .{} files found under {}",
            RECORDING_EXTENSION,
            input_dir.display()
        );
    }

    let mut summary = BatchSummary {
        files_found: files.len() as u64,
        ..Default::default()
    };

    for file in files {
        let relative = file.strip_prefix(input_dir).with_context(|| {
            format!(
                "{} is not under input directory {}",
                file.display(),
                input_dir.display()
            )
        })?;
        let destination = output_dir.join(relative);

        if destination.exists() {
            info!("{}: output exists, skipping", relative.display());
            summary.files_skipped += 1;
            continue;
        }

        let report = repair_file(&file, &destination, config)?;
        match report.outcome {
            FileOutcome::Copied => summary.files_copied += 1,
            FileOutcome::Rewritten(_) => summary.files_rewritten += 1,
        }
    }

    Ok(summary)
}
