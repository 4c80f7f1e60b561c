use super::expand_tilde;
use super::types::*;
use lettre::message::Mailbox;
use std::fs;
use std::path::Path;

/// Environment variable consulted when no SMTP password file is configured
pub const SMTP_PASSWORD_ENV: &str = "WORLD_BACKUP_SMTP_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No SMTP password: set email.password_file or WORLD_BACKUP_SMTP_PASSWORD")]
    MissingPassword,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load, expand and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&contents)?;
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Replace a leading `~` in every configured path
fn expand_paths(config: &mut Config) {
    let global = &mut config.global;
    global.saves_directory = expand_tilde(&global.saves_directory);
    global.staging_directory = expand_tilde(&global.staging_directory);
    global.log_directory = expand_tilde(&global.log_directory);

    config.drive.credentials_file = expand_tilde(&config.drive.credentials_file);
    config.drive.token_file = expand_tilde(&config.drive.token_file);

    if let Some(ref file) = config.email.password_file {
        config.email.password_file = Some(expand_tilde(file));
    }
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    let global = &config.global;

    if global.archive_extension.is_empty() || global.archive_extension.starts_with('.') {
        return Err(ConfigError::ValidationError(format!(
            "archive_extension must be non-empty and without a leading dot: {:?}",
            global.archive_extension
        )));
    }

    if global.log_retention == 0 {
        return Err(ConfigError::ValidationError(
            "log_retention must be at least 1".to_string(),
        ));
    }

    if config.archiver.backend == ArchiverBackend::External
        && config.archiver.program.trim().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "archiver.program is required for the external backend".to_string(),
        ));
    }

    if config.archiver.backend == ArchiverBackend::External
        && is_console_rar(&config.archiver.program)
        && global.archive_extension.eq_ignore_ascii_case("zip")
    {
        return Err(ConfigError::ValidationError(format!(
            "archiver.program {:?} only writes RAR archives; use WinRAR or set archive_extension = \"rar\"",
            config.archiver.program
        )));
    }

    if config.drive.folder_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "drive.folder_name must not be empty".to_string(),
        ));
    }

    if config.email.enabled {
        validate_email(&config.email)?;
    }

    Ok(())
}

/// Console `rar`, as opposed to WinRAR which also writes zip
fn is_console_rar(program: &str) -> bool {
    Path::new(program)
        .file_stem()
        .map_or(false, |stem| stem.to_string_lossy().eq_ignore_ascii_case("rar"))
}

fn validate_email(email: &EmailConfig) -> Result<()> {
    for (field, address) in [("sender", &email.sender), ("recipient", &email.recipient)] {
        address.parse::<Mailbox>().map_err(|e| {
            ConfigError::ValidationError(format!(
                "email.{}: invalid address {:?}: {}",
                field, address, e
            ))
        })?;
    }

    match email.password_file {
        Some(ref file) if !file.exists() => Err(ConfigError::ValidationError(format!(
            "SMTP password file does not exist: {:?}",
            file
        ))),
        Some(_) => Ok(()),
        None if std::env::var_os(SMTP_PASSWORD_ENV).is_some() => Ok(()),
        None => Err(ConfigError::MissingPassword),
    }
}

/// Read the SMTP password from the configured file or the environment
pub fn resolve_smtp_password(email: &EmailConfig) -> Result<String> {
    if let Some(ref file) = email.password_file {
        let password = fs::read_to_string(file)?;
        return Ok(password.trim_end_matches(['\r', '\n']).to_string());
    }

    std::env::var(SMTP_PASSWORD_ENV).map_err(|_| ConfigError::MissingPassword)
}
