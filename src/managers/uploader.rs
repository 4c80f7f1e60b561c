//! Remote container lookup and create-or-update upload

use crate::utils::storage_ops::{EntryQuery, RemoteStorage, StorageError};
use std::path::Path;
use tracing::{error, info};

/// What an upload did remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created { id: String },
    Updated { id: String },
}

impl UploadOutcome {
    pub fn id(&self) -> &str {
        match self {
            UploadOutcome::Created { id } | UploadOutcome::Updated { id } => id,
        }
    }
}

/// Find the live top-level container named `name`, creating it if absent
pub fn ensure_container<S: RemoteStorage + ?Sized>(
    storage: &S,
    name: &str,
) -> Result<String, StorageError> {
    let existing = storage.list_entries(&EntryQuery::container(name))?;

    if let Some(folder) = existing.into_iter().next() {
        info!("Using existing folder '{}' (id: {})", name, folder.id);
        return Ok(folder.id);
    }

    let id = storage.create_container(name)?;
    info!("Created folder '{}' (id: {})", name, id);
    Ok(id)
}

/// Upload `local_file` as `<logical_name>.<ext>` inside `container_id`
///
/// An existing live entry with that name is overwritten in place so its id
/// survives; otherwise a new entry is created.
pub fn upload<S: RemoteStorage + ?Sized>(
    storage: &S,
    container_id: &str,
    local_file: &Path,
    logical_name: &str,
    ext: &str,
) -> Result<UploadOutcome, StorageError> {
    let remote_name = format!("{}.{}", logical_name, ext);

    let existing = storage
        .list_entries(&EntryQuery::entry_in(container_id, &remote_name))
        .map_err(|e| {
            error!("Failed to look up '{}' on remote: {}", remote_name, e);
            e
        })?;

    match existing.into_iter().next() {
        Some(entry) => {
            storage
                .update_entry_content(&entry.id, local_file)
                .map_err(|e| {
                    error!("Failed to update '{}' (id: {}): {}", remote_name, entry.id, e);
                    e
                })?;
            info!("Updated '{}' (id: {})", remote_name, entry.id);
            Ok(UploadOutcome::Updated { id: entry.id })
        }
        None => {
            let id = storage
                .create_entry(container_id, &remote_name, local_file)
                .map_err(|e| {
                    error!("Failed to upload '{}': {}", remote_name, e);
                    e
                })?;
            info!("Uploaded '{}' (id: {})", remote_name, id);
            Ok(UploadOutcome::Created { id })
        }
    }
}
