//! Backup manager - orchestrates one backup run
//!
//! Targets are processed one after another: compress into the staging
//! directory, then create or update the remote copy. A failing target is
//! counted and the run moves on; only authentication, an empty saves
//! directory and the remote folder lookup abort the whole run.

use super::accounting::{RunResult, TargetOutcome};
use super::context::RunContext;
use super::discovery::{discover_targets, BackupTarget};
use super::uploader::{ensure_container, upload};
use crate::config::Config;
use crate::utils::archiver::{archive_path, Compressor};
use crate::utils::storage_ops::{RemoteStorage, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Reasons a run stops before processing any target
#[derive(Debug, thiserror::Error)]
pub enum RunAbort {
    #[error("Remote storage authentication failed: {0}")]
    Authentication(#[source] StorageError),

    #[error("No backup targets found in {0:?}")]
    NoTargets(PathBuf),

    #[error("Failed to find or create remote folder '{name}': {source}")]
    Container {
        name: String,
        #[source]
        source: StorageError,
    },
}

/// Paths and names a run works with
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub saves_directory: PathBuf,
    pub destination_directory: PathBuf,
    pub folder_name: String,
    pub exclude: Vec<String>,
}

impl BackupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            saves_directory: config.global.saves_directory.clone(),
            destination_directory: config.global.staging_directory.clone(),
            folder_name: config.drive.folder_name.clone(),
            exclude: config.global.exclude.clone(),
        }
    }
}

pub struct BackupManager<C: Compressor, S: RemoteStorage> {
    settings: BackupSettings,
    compressor: C,
    storage: S,
}

impl<C: Compressor, S: RemoteStorage> BackupManager<C, S> {
    pub fn new(settings: BackupSettings, compressor: C, storage: S) -> Self {
        Self {
            settings,
            compressor,
            storage,
        }
    }

    /// Execute one run
    pub fn run(&mut self, ctx: &RunContext) -> Result<RunResult, RunAbort> {
        let _span = ctx.span().enter();
        info!("Starting world backup run {}", ctx.run_id());

        if let Err(e) = self.storage.authenticate() {
            error!("Remote storage authentication failed: {}", e);
            return Err(RunAbort::Authentication(e));
        }

        let targets = discover_targets(&self.settings.saves_directory, &self.settings.exclude);
        if targets.is_empty() {
            error!(
                "No world saves found in {:?}, nothing to back up",
                self.settings.saves_directory
            );
            return Err(RunAbort::NoTargets(self.settings.saves_directory.clone()));
        }
        info!("Found {} world save(s) to back up", targets.len());

        let folder_id = ensure_container(&self.storage, &self.settings.folder_name).map_err(
            |source| {
                error!(
                    "Failed to find or create remote folder '{}': {}",
                    self.settings.folder_name, source
                );
                RunAbort::Container {
                    name: self.settings.folder_name.clone(),
                    source,
                }
            },
        )?;

        let mut result = RunResult::new(&self.settings.destination_directory);
        for target in &targets {
            let outcome = self.backup_target(target, &folder_id);
            result.record(&target.name, outcome);
        }

        info!(
            "Backup summary: {} succeeded, {} failed",
            result.success_count(),
            result.failure_count()
        );

        let removed = cleanup_local_archives(
            &self.settings.destination_directory,
            self.compressor.extension(),
        );
        info!("Removed {} local archive(s)", removed);

        Ok(result)
    }

    /// Compress and upload one target
    fn backup_target(&self, target: &BackupTarget, folder_id: &str) -> TargetOutcome {
        let destination = &self.settings.destination_directory;
        let ext = self.compressor.extension();

        info!("Compressing '{}'", target.name);
        let artifact = match self
            .compressor
            .compress(&target.source_path, &target.name, destination)
        {
            Ok(artifact) if artifact.file_path.is_file() => artifact,
            Ok(artifact) => {
                error!(
                    "Compression of '{}' reported success but {:?} does not exist",
                    target.name, artifact.file_path
                );
                return TargetOutcome::CompressFailed(
                    "archive missing after compression".to_string(),
                );
            }
            Err(e) => {
                error!("Failed to compress '{}': {}", target.name, e);
                remove_partial_archive(&archive_path(destination, &target.name, ext));
                return TargetOutcome::CompressFailed(e.to_string());
            }
        };

        info!("Uploading '{}'", target.name);
        match upload(&self.storage, folder_id, &artifact.file_path, &target.name, ext) {
            Ok(outcome) => {
                debug!("'{}' stored as {}", target.name, outcome.id());
                TargetOutcome::Uploaded
            }
            Err(e) => {
                error!("Failed to upload '{}': {}", target.name, e);
                TargetOutcome::UploadFailed(e.to_string())
            }
        }
    }
}

fn remove_partial_archive(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial archive {:?}", path),
        Err(e) => warn!("Failed to remove partial archive {:?}: {}", path, e),
    }
}

/// Delete every `*.<ext>` file in `directory`; returns how many were removed
///
/// Individual failures are logged and skipped.
pub fn cleanup_local_archives(directory: &Path, ext: &str) -> usize {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read staging directory {:?} for cleanup: {}", directory, e);
            return 0;
        }
    };

    let mut removed = 0;
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        let matches = path.is_file()
            && path
                .extension()
                .map_or(false, |e| e.to_string_lossy() == ext);
        if !matches {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed local archive {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("Failed to remove local archive {:?}: {}", path, e),
        }
    }
    removed
}
