//! Per-run context
//!
//! Built once in `main` and passed to every component that needs the run
//! timestamp or the run's log file, so nothing depends on process-global
//! state and tests can inject a fixed timestamp.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::Span;

/// Prefix shared by every run log file name
pub const LOG_FILE_PREFIX: &str = "backup_log_";

/// Extension of run log files
pub const LOG_FILE_EXTENSION: &str = "log";

#[derive(Debug, Clone)]
pub struct RunContext {
    started_at: DateTime<Local>,
    log_directory: PathBuf,
    span: Span,
}

impl RunContext {
    pub fn new(started_at: DateTime<Local>, log_directory: &Path) -> Self {
        let run_id = started_at.format("%Y-%m-%d_%H%M%S").to_string();
        Self {
            started_at,
            log_directory: log_directory.to_path_buf(),
            span: tracing::info_span!("run", id = %run_id),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Run identifier derived from the start time (`2026-10-15_013000`)
    pub fn run_id(&self) -> String {
        self.started_at.format("%Y-%m-%d_%H%M%S").to_string()
    }

    pub fn log_directory(&self) -> &Path {
        &self.log_directory
    }

    /// File name of this run's log
    pub fn log_file_name(&self) -> String {
        format!("{}{}.{}", LOG_FILE_PREFIX, self.run_id(), LOG_FILE_EXTENSION)
    }

    /// Full path of this run's log
    pub fn log_file(&self) -> PathBuf {
        self.log_directory.join(self.log_file_name())
    }

    /// Span every run-scoped event is recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }
}
