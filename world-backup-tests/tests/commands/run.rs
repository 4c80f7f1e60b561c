//! Tests for the 'run' command
//!
//! A run authenticates, discovers saves, finds the Drive folder, then
//! compresses and uploads every save before cleaning the staging directory.

use std::fs;
use test_utils::{
    files_with_extension, sample_worlds, ConfigBuilder, MockCompressor, MockStorage, RunAbort,
    StorageCall, TargetOutcome, TestContext,
};
use world_backup::managers::backup::{BackupManager, BackupSettings};
use world_backup::managers::logging::{init_logging, LoggingConfig};
use world_backup::utils::drive::GoogleDrive;

fn three_worlds() -> TestContext {
    TestContext::from_builder(ConfigBuilder::new().add_worlds(&sample_worlds()))
}

#[test]
fn test_run_all_targets_succeed() {
    let ctx = three_worlds();
    let storage = MockStorage::new();
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(result.success_count(), 3);
    assert_eq!(result.failure_count(), 0);
    assert!(result.all_succeeded());
    assert_eq!(compressor.call_count(), 3);
    assert_eq!(storage.upload_calls(), 3);
    for world in sample_worlds() {
        assert_eq!(storage.live_named(&format!("{}.zip", world)).len(), 1);
    }
}

#[test]
fn test_run_one_compress_failure() {
    let ctx = three_worlds();
    let storage = MockStorage::new();
    let compressor = MockCompressor::new()
        .with_failing_target("Beta")
        .with_partial_output();

    let result = ctx
        .manager(compressor.clone(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(compressor.get_calls(), vec!["Alpha", "Beta", "Gamma"]);
    assert!(matches!(
        result.outcomes()[1],
        (ref name, TargetOutcome::CompressFailed(_)) if name == "Beta"
    ));
    assert!(storage.live_named("Beta.zip").is_empty());
    assert!(files_with_extension(ctx.staging_dir(), "zip").is_empty());
}

#[test]
fn test_run_summary_line_in_log() {
    let ctx = three_worlds();
    let run = ctx.run_context();
    let _guard = init_logging(&run, &LoggingConfig::default()).unwrap();

    let compressor = MockCompressor::new().with_failing_target("Beta");
    ctx.manager(compressor, MockStorage::new()).run(&run).unwrap();

    let log = fs::read_to_string(run.log_file()).unwrap();
    assert!(log.contains("Backup summary: 2 succeeded, 1 failed"));
    assert!(log.contains("Failed to compress 'Beta'"));
}

#[test]
fn test_run_upload_failure_continues() {
    let ctx = three_worlds();
    let storage = MockStorage::new().with_failing_upload("Alpha.zip");

    let result = ctx
        .manager(MockCompressor::new(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(result.success_count(), 2);
    assert!(matches!(result.outcomes()[0].1, TargetOutcome::UploadFailed(_)));
    assert_eq!(storage.live_named("Gamma.zip").len(), 1);
    assert!(files_with_extension(ctx.staging_dir(), "zip").is_empty());
}

#[test]
fn test_run_every_target_fails() {
    let ctx = three_worlds();
    let mut compressor = MockCompressor::new();
    for world in sample_worlds() {
        compressor = compressor.with_failing_target(world);
    }

    let result = ctx
        .manager(compressor, MockStorage::new())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(result.success_count(), 0);
    assert_eq!(result.failure_count(), 3);
}

#[test]
fn test_run_twice_updates_in_place() {
    let ctx = three_worlds();
    let storage = MockStorage::new();

    ctx.manager(MockCompressor::new(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();
    let first_id = storage.live_named("Alpha.zip")[0].id.clone();

    ctx.manager(MockCompressor::new(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();

    let alpha = storage.live_named("Alpha.zip");
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].id, first_id);
    assert_eq!(alpha[0].revisions, 2);
    assert_eq!(storage.containers_created(), 1);
}

#[test]
fn test_run_empty_saves_is_fatal() {
    let ctx = TestContext::from_builder(ConfigBuilder::new());
    let storage = MockStorage::new();
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), storage.clone())
        .run(&ctx.run_context());

    assert!(matches!(result, Err(RunAbort::NoTargets(_))));
    assert_eq!(compressor.call_count(), 0);
    assert_eq!(storage.upload_calls(), 0);
    assert_eq!(storage.containers_created(), 0);
}

#[test]
fn test_run_missing_saves_is_fatal() {
    let builder = ConfigBuilder::new();
    let missing = builder.temp_dir().join("no-saves-here");
    let ctx = TestContext::from_builder(builder.with_saves_dir(&missing));
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), MockStorage::new())
        .run(&ctx.run_context());

    assert!(matches!(result, Err(RunAbort::NoTargets(_))));
    assert_eq!(compressor.call_count(), 0);
}

#[test]
fn test_run_auth_failure_is_fatal() {
    let ctx = three_worlds();
    let storage = MockStorage::new().with_failing_auth();
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), storage.clone())
        .run(&ctx.run_context());

    assert!(matches!(result, Err(RunAbort::Authentication(_))));
    assert_eq!(storage.get_calls(), vec![StorageCall::Authenticate]);
    assert_eq!(compressor.call_count(), 0);
}

#[test]
fn test_run_without_token_file_needs_authorize() {
    let builder = ConfigBuilder::new().add_worlds(&sample_worlds());
    let missing = builder.temp_dir().join("never-authorized.json");
    let ctx = TestContext::from_builder(builder.with_token_file(&missing));
    let config = ctx.config().unwrap();
    let compressor = MockCompressor::new();

    let drive = GoogleDrive::new(&config.drive).unwrap();
    let mut manager =
        BackupManager::new(BackupSettings::from_config(config), compressor.clone(), drive);
    let err = manager.run(&ctx.run_context()).unwrap_err();

    assert!(matches!(err, RunAbort::Authentication(_)));
    assert!(err.to_string().contains("world-backup authorize"));
    assert_eq!(compressor.call_count(), 0);
}

#[test]
fn test_run_container_failure_is_fatal() {
    let ctx = three_worlds();
    let storage = MockStorage::new().with_failing_container();
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), storage.clone())
        .run(&ctx.run_context());

    assert!(matches!(result, Err(RunAbort::Container { .. })));
    assert_eq!(compressor.call_count(), 0);
    assert_eq!(storage.upload_calls(), 0);
}

#[test]
fn test_run_excluded_world_untouched() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .add_worlds(&sample_worlds())
            .exclude("Gamma"),
    );
    let compressor = MockCompressor::new();

    let result = ctx
        .manager(compressor.clone(), MockStorage::new())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(result.total(), 2);
    assert_eq!(compressor.get_calls(), vec!["Alpha", "Beta"]);
}

#[test]
fn test_run_cleanup_removes_foreign_archives() {
    let ctx = three_worlds();
    fs::write(ctx.staging_dir().join("leftover-from-last-week.zip"), "old").unwrap();
    fs::write(ctx.staging_dir().join("notes.txt"), "keep").unwrap();

    ctx.manager(MockCompressor::new(), MockStorage::new())
        .run(&ctx.run_context())
        .unwrap();

    assert!(files_with_extension(ctx.staging_dir(), "zip").is_empty());
    assert!(ctx.staging_dir().join("notes.txt").exists());
}

#[test]
fn test_run_reuses_existing_folder() {
    let ctx = three_worlds();
    let storage = MockStorage::new();
    let folder = storage.seed(None, "Backups_Test", true, false);

    ctx.manager(MockCompressor::new(), storage.clone())
        .run(&ctx.run_context())
        .unwrap();

    assert_eq!(storage.containers_created(), 0);
    let alpha = &storage.live_named("Alpha.zip")[0];
    assert_eq!(alpha.parent.as_deref(), Some(folder.as_str()));
}
