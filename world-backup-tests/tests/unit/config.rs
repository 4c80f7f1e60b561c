//! Unit tests for configuration loading and validation

use serial_test::serial;
use std::fs;
use test_utils::{ConfigBuilder, LogPruneMode, ResultAssertions, TestContext};
use world_backup::config::{
    load_config, resolve_smtp_password, ArchiverBackend, ConfigError, SMTP_PASSWORD_ENV,
};

#[test]
fn test_config_round_trip() {
    let (path, config, _temp) = ConfigBuilder::minimal()
        .exclude("Scratch")
        .with_log_retention(3, LogPruneMode::KeepNewest)
        .persist_to_file();

    let loaded = load_config(&path).assert_ok();
    assert_eq!(loaded.global.exclude, vec!["Scratch".to_string()]);
    assert_eq!(loaded.global.log_retention, 3);
    assert_eq!(loaded.global.log_prune_mode, LogPruneMode::KeepNewest);
    assert_eq!(loaded.drive.token_file, config.drive.token_file);
}

#[test]
fn test_config_missing_token_file_still_loads() {
    let builder = ConfigBuilder::minimal();
    let missing = builder.temp_dir().join("absent-token.json");
    let (path, _, _temp) = builder.with_token_file(&missing).persist_to_file();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.drive.token_file, missing);
}

#[test]
fn test_config_console_rar_with_zip_rejected() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_external_archiver("rar")
        .with_extension("zip")
        .persist_to_file();
    load_config(&path).assert_err_contains("only writes RAR archives");
}

#[test]
fn test_config_console_rar_with_rar_extension() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_external_archiver("rar")
        .with_extension("rar")
        .persist_to_file();
    load_config(&path).assert_ok();
}

#[test]
fn test_config_empty_folder_name() {
    let (path, _, _temp) = ConfigBuilder::minimal().with_folder_name("  ").persist_to_file();
    load_config(&path).assert_err_contains("folder_name");
}

#[test]
fn test_config_zero_retention() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_log_retention(0, LogPruneMode::PurgeAll)
        .persist_to_file();
    load_config(&path).assert_err_contains("log_retention");
}

#[test]
fn test_config_external_archiver_requires_program() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_external_archiver("")
        .persist_to_file();
    load_config(&path).assert_err_contains("archiver.program");
}

#[test]
fn test_config_external_archiver() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_external_archiver("C:/Program Files/WinRAR/WinRAR.exe")
        .with_extension("rar")
        .persist_to_file();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.archiver.backend, ArchiverBackend::External);
    assert_eq!(config.global.archive_extension, "rar");
}

#[test]
fn test_config_invalid_email_address() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_email("not-an-address", "admin@example.com", "secret")
        .persist_to_file();
    load_config(&path).assert_err_contains("email.sender");
}

#[test]
fn test_config_password_file() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_email("backup@example.com", "admin@example.com", "app-password\n")
        .persist_to_file();

    let config = load_config(&path).assert_ok();
    assert_eq!(resolve_smtp_password(&config.email).assert_ok(), "app-password");
}

#[test]
#[serial]
fn test_config_password_from_env() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_email_from_env("backup@example.com", "admin@example.com")
        .persist_to_file();

    std::env::set_var(SMTP_PASSWORD_ENV, "from-env");
    let config = load_config(&path);
    let password = config.as_ref().map(|c| resolve_smtp_password(&c.email));
    std::env::remove_var(SMTP_PASSWORD_ENV);

    assert_eq!(password.assert_ok().assert_ok(), "from-env");
}

#[test]
#[serial]
fn test_config_missing_password() {
    let (path, _, _temp) = ConfigBuilder::minimal()
        .with_email_from_env("backup@example.com", "admin@example.com")
        .persist_to_file();

    std::env::remove_var(SMTP_PASSWORD_ENV);
    assert!(matches!(load_config(&path), Err(ConfigError::MissingPassword)));
}

#[test]
fn test_config_invalid_toml() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", "[global\nsaves_directory = ");
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_config_missing_file() {
    let ctx = TestContext::new();
    let result = load_config(ctx.temp_dir().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_config_tilde_expanded() {
    let builder = ConfigBuilder::minimal();
    let token = builder.temp_dir().join("token.json");
    let path = builder.temp_dir().join("tilde.toml");
    fs::write(
        &path,
        format!(
            "[global]\nsaves_directory = \"~/saves\"\n\n[drive]\ncredentials_file = \"~/creds.json\"\ntoken_file = \"{}\"\n",
            token.display()
        ),
    )
    .unwrap();

    let config = load_config(&path).assert_ok();
    assert!(!config.global.saves_directory.starts_with("~"));
    assert!(!config.drive.credentials_file.starts_with("~"));
}
