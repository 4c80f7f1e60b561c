//! Unit tests for the archive backends

use std::fs::{self, File};
use std::path::Path;
use test_utils::{populate_world, Compressor, MockExecutor, MockResponse, TestContext};
use world_backup::utils::archiver::{CompressError, ExternalArchiver, ZipArchiver};

#[test]
fn test_external_archiver_invocation() {
    let ctx = TestContext::new();
    let saves = ctx.create_subdir("saves");
    let world = populate_world(&saves, "Alpha");
    let staging = ctx.temp_dir().join("staging");

    let executor = MockExecutor::new();
    let archiver = ExternalArchiver::new(
        "C:/Program Files/WinRAR/WinRAR.exe".into(),
        "rar",
        executor.clone(),
    );
    let artifact = archiver.compress(&world, "Alpha", &staging).unwrap();

    assert!(staging.is_dir(), "destination directory is created");
    assert_eq!(artifact.file_path, staging.join("Alpha.rar"));
    assert_eq!(artifact.destination_directory, staging);

    let calls = executor.get_calls();
    assert_eq!(calls.len(), 1);
    let output = staging.join("Alpha.rar").display().to_string();
    assert_eq!(
        calls[0].args,
        vec!["a", "-s", "-ep1", "-r", "-iback", "-idq", output.as_str(), "*"]
    );
    assert_eq!(calls[0].working_dir.as_deref(), Some(world.as_path()));
}

#[test]
fn test_external_archiver_nonzero_exit() {
    let ctx = TestContext::new();
    let world = populate_world(&ctx.create_subdir("saves"), "Beta");

    let executor = MockExecutor::new().with_default_response(MockResponse::Failure {
        stderr: "ERROR: cannot open".to_string(),
        exit_code: 2,
    });
    let archiver = ExternalArchiver::new("rar".into(), "zip", executor);
    let result = archiver.compress(&world, "Beta", &ctx.temp_dir().join("staging"));

    match result {
        Err(CompressError::Failed { code, stderr }) => {
            assert_eq!(code, Some(2));
            assert!(stderr.contains("cannot open"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[test]
fn test_external_archiver_not_found() {
    let ctx = TestContext::new();
    let world = populate_world(&ctx.create_subdir("saves"), "Gamma");

    let executor = MockExecutor::new().expect("rar", MockResponse::NotFound);
    let archiver = ExternalArchiver::new("rar".into(), "zip", executor);
    let result = archiver.compress(&world, "Gamma", &ctx.temp_dir().join("staging"));

    assert!(matches!(result, Err(CompressError::ArchiverNotFound { .. })));
}

#[test]
fn test_zip_archiver_entries_relative_to_world() {
    let ctx = TestContext::new();
    let world = populate_world(&ctx.create_subdir("saves"), "Alpha");
    let staging = ctx.temp_dir().join("staging");

    let artifact = ZipArchiver::default().compress(&world, "Alpha", &staging).unwrap();
    assert_eq!(artifact.file_path, staging.join("Alpha.zip"));

    let archive = zip::ZipArchive::new(File::open(&artifact.file_path).unwrap()).unwrap();
    let names: Vec<_> = archive.file_names().map(String::from).collect();
    assert!(names.contains(&"level.dat".to_string()));
    assert!(names.contains(&"region/r.0.0.mca".to_string()));
    assert!(names.iter().all(|n| !n.starts_with("Alpha")));
}

#[test]
fn test_zip_archiver_missing_source() {
    let ctx = TestContext::new();
    let result = ZipArchiver::default().compress(
        Path::new("/definitely/not/here"),
        "Ghost",
        &ctx.temp_dir().join("staging"),
    );

    assert!(matches!(result, Err(CompressError::Io { .. })));
    assert!(!ctx.temp_dir().join("staging").join("Ghost.zip").exists());
}

#[test]
fn test_zip_archiver_overwrites_previous_archive() {
    let ctx = TestContext::new();
    let world = populate_world(&ctx.create_subdir("saves"), "Alpha");
    let staging = ctx.create_subdir("staging");
    fs::write(staging.join("Alpha.zip"), "stale").unwrap();

    let artifact = ZipArchiver::default().compress(&world, "Alpha", &staging).unwrap();
    assert!(zip::ZipArchive::new(File::open(&artifact.file_path).unwrap()).is_ok());
}
