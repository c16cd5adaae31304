//! Sequential batch conversion with progress and failure reporting.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::convert::{ConversionResult, Converter};
use crate::error::ErrorKind;
use crate::render::Renderer;

/// Prefix of every output file name; the 1-based position follows it.
pub const OUTPUT_PREFIX: &str = "BulkPDF";

/// `<dir>/BulkPDF<position>.pdf`.
pub fn output_path(dir: &Path, position: usize) -> PathBuf {
    dir.join(format!("{OUTPUT_PREFIX}{position}.pdf"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Receives batch events as they happen. Called only from the thread running
/// the batch.
pub trait BatchObserver {
    /// After each file, successful or not.
    fn on_progress(&mut self, _progress: Progress) {}

    /// As soon as a file fails, before its progress event.
    fn on_failure(&mut self, _input: &Path, _kind: ErrorKind, _message: &str) {}

    /// Checked before each file; returning `false` stops the batch early.
    fn should_continue(&self) -> bool {
        true
    }
}

/// No-op observer.
impl BatchObserver for () {}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ConversionResult>,
}

/// Converts `inputs` in order into `output_dir`, one `BulkPDF<n>.pdf` each.
/// A failing file never aborts the rest of the batch.
pub fn run_batch<R: Renderer>(
    converter: &Converter<R>,
    inputs: &[PathBuf],
    output_dir: &Path,
    observer: &mut dyn BatchObserver,
) -> BatchReport {
    let total = inputs.len();
    let mut results = Vec::with_capacity(total);

    for (index, input) in inputs.iter().enumerate() {
        if !observer.should_continue() {
            warn!(remaining = total - index, "batch stopped early");
            break;
        }
        let position = index + 1;
        let result = converter.convert_one(input, &output_path(output_dir, position));
        if let ConversionResult::Failure {
            input,
            kind,
            message,
        } = &result
        {
            observer.on_failure(input, *kind, message);
        }
        results.push(result);
        observer.on_progress(Progress {
            completed: position,
            total,
        });
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let report = BatchReport {
        attempted: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    };
    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        "batch finished"
    );
    report
}

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
}

/// Expands the command-line inputs. Files are kept as given; directories are
/// walked recursively in file-name order for `.eml` files.
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_eml(entry.path()) {
                inputs.push(entry.into_path());
            }
        }
    }
    inputs
}
