//! Build pass result types.

use crate::transform::TransformError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of one build pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Files claimed by a transformer
    pub transformed: Vec<PathBuf>,
    /// Unclaimed files copied verbatim
    pub copied: Vec<PathBuf>,
    /// Unclaimed files skipped because an entry consumes them
    pub skipped_dependencies: Vec<PathBuf>,
    /// Files filtered out by the ignore list
    pub ignored: Vec<PathBuf>,
    /// Files written to the output directory
    pub outputs: Vec<PathBuf>,
    /// Candidate files with at least one error
    pub failed: Vec<PathBuf>,
    /// Every error raised during the pass
    pub errors: Vec<TransformError>,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl PassReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pass duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the pass finished without errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of candidate files that were handled (ignored files excluded).
    pub fn processed_count(&self) -> usize {
        self.transformed.len() + self.copied.len() + self.skipped_dependencies.len()
    }

    /// Whether `file` was a candidate of this pass and was not ignored.
    pub fn processed(&self, file: &Path) -> bool {
        [&self.transformed, &self.copied, &self.skipped_dependencies, &self.failed]
            .iter()
            .any(|files| files.iter().any(|f| f == file))
    }

    /// Format a summary of the pass.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        if self.is_success() {
            lines.push(format!(
                "Build succeeded: {} transformed, {} copied, {} written in {:?}",
                self.transformed.len(),
                self.copied.len(),
                self.outputs.len(),
                self.duration
            ));
        } else {
            lines.push(format!(
                "Build failed: {} {} in {} {}",
                self.errors.len(),
                if self.errors.len() == 1 { "error" } else { "errors" },
                self.failed.len(),
                if self.failed.len() == 1 { "file" } else { "files" }
            ));
            for error in &self.errors {
                lines.push(format!("  - {}", error));
            }
        }

        lines.join("\n")
    }
}
