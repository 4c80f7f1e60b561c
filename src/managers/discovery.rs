//! Backup target discovery
//!
//! Every immediate subdirectory of the saves root is one target.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// One directory to back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub name: String,
    pub source_path: PathBuf,
}

/// List the targets under `root`, skipping names in `exclude`
///
/// A missing or unreadable root yields an empty list; the caller decides
/// whether that is fatal.
pub fn discover_targets(root: &Path, exclude: &[String]) -> Vec<BackupTarget> {
    if !root.is_dir() {
        error!("Saves directory does not exist or is not a directory: {:?}", root);
        return Vec::new();
    }

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to read saves directory {:?}: {}", root, e);
            return Vec::new();
        }
    };

    let mut targets: Vec<BackupTarget> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", root, e);
                None
            }
        })
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if exclude.iter().any(|x| x == &name) {
                debug!("Excluded from backup: {}", name);
                return None;
            }
            Some(BackupTarget {
                name,
                source_path: entry.path(),
            })
        })
        .collect();

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Discovered {} target(s) in {:?}", targets.len(), root);
    targets
}
