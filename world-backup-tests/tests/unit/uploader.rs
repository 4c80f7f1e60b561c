//! Unit tests for container lookup and upsert upload

use std::fs;
use test_utils::{MockStorage, RemoteStorage, StorageCall, TestContext};
use world_backup::managers::uploader::{ensure_container, upload, UploadOutcome};
use world_backup::utils::storage_ops::{EntryKind, StorageError};

fn authenticated() -> MockStorage {
    let mut storage = MockStorage::new();
    storage.authenticate().unwrap();
    storage
}

#[test]
fn test_ensure_container_twice_same_id() {
    let storage = authenticated();

    let first = ensure_container(&storage, "Backups_Minecraft_Vanilla").unwrap();
    let second = ensure_container(&storage, "Backups_Minecraft_Vanilla").unwrap();

    assert_eq!(first, second);
    assert_eq!(storage.containers_created(), 1);
}

#[test]
fn test_ensure_container_reuses_existing() {
    let storage = authenticated();
    let existing = storage.seed(None, "Backups", true, false);

    assert_eq!(ensure_container(&storage, "Backups").unwrap(), existing);
    assert_eq!(storage.containers_created(), 0);
}

#[test]
fn test_ensure_container_queries_live_folders() {
    let storage = authenticated();
    ensure_container(&storage, "Backups").unwrap();

    let query = storage
        .get_calls()
        .into_iter()
        .find_map(|c| match c {
            StorageCall::List { query } => Some(query),
            _ => None,
        })
        .unwrap();
    assert_eq!(query.kind, EntryKind::Container);
    assert_eq!(query.parent, None);
    assert!(!query.include_trashed);
}

#[test]
fn test_ensure_container_failure() {
    let mut storage = MockStorage::new().with_failing_container();
    storage.authenticate().unwrap();

    let result = ensure_container(&storage, "Backups");
    assert!(matches!(result, Err(StorageError::Api { status: 403, .. })));
}

#[test]
fn test_upload_twice_keeps_one_entry() {
    let ctx = TestContext::new();
    let archive = ctx.create_file("staging/Alpha.zip", "first");
    let storage = authenticated();
    let folder = ensure_container(&storage, "Backups").unwrap();

    let first = upload(&storage, &folder, &archive, "Alpha", "zip").unwrap();
    fs::write(&archive, "second").unwrap();
    let second = upload(&storage, &folder, &archive, "Alpha", "zip").unwrap();

    assert_eq!(first, UploadOutcome::Created { id: first.id().to_string() });
    assert_eq!(second, UploadOutcome::Updated { id: first.id().to_string() });

    let live = storage.live_named("Alpha.zip");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].content, b"second");
}

#[test]
fn test_upload_ignores_trashed_copy() {
    let ctx = TestContext::new();
    let archive = ctx.create_file("staging/Alpha.zip", "data");
    let storage = authenticated();
    let folder = ensure_container(&storage, "Backups").unwrap();
    let trashed = storage.seed(Some(&folder), "Alpha.zip", false, true);

    let outcome = upload(&storage, &folder, &archive, "Alpha", "zip").unwrap();

    assert!(matches!(outcome, UploadOutcome::Created { .. }));
    assert_ne!(outcome.id(), trashed);
}

#[test]
fn test_upload_only_matches_within_folder() {
    let ctx = TestContext::new();
    let archive = ctx.create_file("staging/Alpha.zip", "data");
    let storage = authenticated();
    let other = storage.seed(None, "Other", true, false);
    storage.seed(Some(&other), "Alpha.zip", false, false);
    let folder = ensure_container(&storage, "Backups").unwrap();

    let outcome = upload(&storage, &folder, &archive, "Alpha", "zip").unwrap();
    assert!(matches!(outcome, UploadOutcome::Created { .. }));
    assert_eq!(storage.live_named("Alpha.zip").len(), 2);
}

#[test]
fn test_upload_uses_configured_extension() {
    let ctx = TestContext::new();
    let archive = ctx.create_file("staging/Alpha.rar", "data");
    let storage = authenticated();
    let folder = ensure_container(&storage, "Backups").unwrap();

    upload(&storage, &folder, &archive, "Alpha", "rar").unwrap();
    assert_eq!(storage.live_named("Alpha.rar").len(), 1);
}
