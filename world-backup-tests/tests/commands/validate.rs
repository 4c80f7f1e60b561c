//! Tests for the 'validate' command
//!
//! The validate command checks configuration file syntax and validity.

use test_utils::{ConfigBuilder, ResultAssertions, TestContext};
use world_backup::config::{load_config, ConfigError};

#[test]
fn test_validate_valid_config() {
    let (path, _, _temp) = ConfigBuilder::minimal().persist_to_file();
    let config = load_config(&path).assert_ok();
    assert_eq!(config.drive.folder_name, "Backups_Test");
}

#[test]
fn test_validate_with_email() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_email("backup@example.com", "Admin <admin@example.com>", "pw")
        .persist_to_file();

    let config = load_config(&path).assert_ok();
    assert!(config.email.enabled);
    assert_eq!(config.email.smtp_host, "smtp.gmail.com");
    assert_eq!(config.email.smtp_port, 465);
}

#[test]
fn test_validate_missing_drive_section() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        "[global]\nsaves_directory = \"/saves\"\n",
    );

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_validate_dotted_extension() {
    let (path, _, _temp) = ConfigBuilder::minimal().with_extension(".zip").persist_to_file();
    load_config(&path).assert_err_contains("leading dot");
}

#[test]
fn test_validate_unknown_prune_mode() {
    let (path, _, _temp) = ConfigBuilder::minimal().persist_to_file();
    let body = std::fs::read_to_string(&path)
        .unwrap()
        .replace("purge-all", "shred-everything");
    std::fs::write(&path, body).unwrap();

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
