//! Post-run notification
//!
//! Mails the newest run log and prunes the log directory. Nothing here can
//! fail the run: every problem is logged and the next step proceeds.

use crate::config::LogPruneMode;
use crate::utils::mailer::Mailer;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

use super::context::LOG_FILE_EXTENSION;

/// One run log on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArtifact {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

impl LogArtifact {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(Self {
            path: path.to_path_buf(),
            modified: DateTime::<Local>::from(modified),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Modification time as shown in the subject and body
    pub fn modified_label(&self) -> String {
        self.modified.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Log files in `log_dir` with their modification times
fn log_files(log_dir: &Path) -> io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(log_dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", log_dir, e);
                continue;
            }
        };
        let is_log = path.is_file()
            && path
                .extension()
                .map_or(false, |e| e.to_string_lossy() == LOG_FILE_EXTENSION);
        if !is_log {
            continue;
        }
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((path, modified));
    }
    Ok(files)
}

/// Newest log in `log_dir` by modification time
pub fn latest_log(log_dir: &Path) -> Option<LogArtifact> {
    let files = match log_files(log_dir) {
        Ok(files) => files,
        Err(e) => {
            error!("Cannot read log directory {:?}: {}", log_dir, e);
            return None;
        }
    };

    let newest = files.into_iter().max_by_key(|(_, modified)| *modified)?;
    match LogArtifact::from_path(&newest.0) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            error!("Cannot read log file {:?}: {}", newest.0, e);
            None
        }
    }
}

/// Apply the retention limit to `log_dir`; returns how many logs were deleted
pub fn prune_logs(log_dir: &Path, limit: usize, mode: LogPruneMode) -> usize {
    let mut files = match log_files(log_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot read log directory {:?} for pruning: {}", log_dir, e);
            return 0;
        }
    };

    let count = files.len();
    if count < limit {
        debug!("{} log(s) present, below the limit of {}", count, limit);
        return 0;
    }

    let doomed: Vec<PathBuf> = match mode {
        LogPruneMode::PurgeAll => {
            info!("Log limit reached, deleting {} log(s) (limit: {})", count, limit);
            files.into_iter().map(|(path, _)| path).collect()
        }
        LogPruneMode::KeepNewest => {
            files.sort_by(|a, b| b.1.cmp(&a.1));
            let keep = limit.saturating_sub(1);
            info!("Log limit reached, keeping the newest {} log(s)", keep);
            files.into_iter().skip(keep).map(|(path, _)| path).collect()
        }
    };

    let mut removed = 0;
    for path in doomed {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted log {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("Failed to delete log {:?}: {}", path, e),
        }
    }
    removed
}

/// What the notification step did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub log: Option<PathBuf>,
    pub mailed: bool,
    pub pruned: usize,
}

/// Sends the latest log and prunes old ones
pub struct NotificationManager {
    mailer: Option<Box<dyn Mailer>>,
    log_retention: usize,
    prune_mode: LogPruneMode,
}

impl NotificationManager {
    /// `mailer` is `None` when email is disabled; pruning still happens
    pub fn new(
        mailer: Option<Box<dyn Mailer>>,
        log_retention: usize,
        prune_mode: LogPruneMode,
    ) -> Self {
        Self {
            mailer,
            log_retention,
            prune_mode,
        }
    }

    pub fn notify(&self, log_dir: &Path) -> NotificationReport {
        let mut report = NotificationReport::default();

        match latest_log(log_dir) {
            Some(log) => {
                report.log = Some(log.path.clone());
                report.mailed = self.send(&log);
            }
            None => warn!("No log file found in {:?}, skipping email", log_dir),
        }

        report.pruned = prune_logs(log_dir, self.log_retention, self.prune_mode);
        report
    }

    fn send(&self, log: &LogArtifact) -> bool {
        let Some(ref mailer) = self.mailer else {
            debug!("Email disabled, not sending {:?}", log.path);
            return false;
        };

        let subject = format!("World Backup Report - {}", log.modified_label());
        match mailer.send_log(log, &subject) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send log email: {}", e);
                false
            }
        }
    }
}
