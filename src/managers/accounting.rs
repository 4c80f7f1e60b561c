//! Per-run outcome accounting

use std::fmt;
use std::path::{Path, PathBuf};

/// Final state of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Uploaded,
    CompressFailed(String),
    UploadFailed(String),
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::Uploaded)
    }
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOutcome::Uploaded => write!(f, "uploaded"),
            TargetOutcome::CompressFailed(reason) => write!(f, "compression failed: {}", reason),
            TargetOutcome::UploadFailed(reason) => write!(f, "upload failed: {}", reason),
        }
    }
}

/// Outcome counters for one run
#[derive(Debug, Clone)]
pub struct RunResult {
    destination_directory: PathBuf,
    success_count: usize,
    failure_count: usize,
    outcomes: Vec<(String, TargetOutcome)>,
}

impl RunResult {
    pub fn new(destination_directory: &Path) -> Self {
        Self {
            destination_directory: destination_directory.to_path_buf(),
            success_count: 0,
            failure_count: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, outcome: TargetOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.outcomes.push((name.to_string(), outcome));
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn destination_directory(&self) -> &Path {
        &self.destination_directory
    }

    /// Target names with their outcome, in processing order
    pub fn outcomes(&self) -> &[(String, TargetOutcome)] {
        &self.outcomes
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}
