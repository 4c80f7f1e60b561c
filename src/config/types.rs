use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub archiver: ArchiverConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Directory holding one subdirectory per world save
    pub saves_directory: PathBuf,

    /// Where archives are written before upload (purged after every run)
    #[serde(default = "default_staging_directory")]
    pub staging_directory: PathBuf,

    /// Extension of produced archives, without the leading dot
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    /// Save directory names that are never backed up
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,
    #[serde(default)]
    pub log_prune_mode: LogPruneMode,
}

/// How old run logs are pruned once the retention limit is reached
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogPruneMode {
    /// Delete every log once the count reaches the limit
    #[default]
    PurgeAll,
    /// Keep the newest `limit - 1` logs
    KeepNewest,
}

/// Compression backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiverConfig {
    #[serde(default)]
    pub backend: ArchiverBackend,

    /// Archiver executable (path or name looked up on PATH)
    ///
    /// WinRAR picks the archive format from the output extension; console
    /// `rar` only writes RAR archives and needs `archive_extension = "rar"`.
    #[serde(default = "default_archiver_program")]
    pub program: String,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            backend: ArchiverBackend::default(),
            program: default_archiver_program(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiverBackend {
    /// External RAR-compatible command line tool
    #[default]
    External,
    /// Built-in zip writer
    Builtin,
}

/// Google Drive destination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveConfig {
    /// Name of the top-level folder that receives the archives
    #[serde(default = "default_folder_name")]
    pub folder_name: String,

    /// OAuth client secrets downloaded from the Google Cloud console
    pub credentials_file: PathBuf,

    /// Authorized-user token file (refreshed and rewritten in place)
    pub token_file: PathBuf,
}

/// Email delivery of the run log
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_enabled")]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,

    /// File containing the SMTP password (falls back to WORLD_BACKUP_SMTP_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            sender: String::new(),
            recipient: String::new(),
            password_file: None,
        }
    }
}

// Default value functions

fn default_staging_directory() -> PathBuf { PathBuf::from("~/world-backup/staging") }
fn default_archive_extension() -> String { "zip".to_string() }
fn default_log_directory() -> PathBuf { PathBuf::from("~/world-backup/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_retention() -> usize { 5 }
fn default_archiver_program() -> String { r"C:\Program Files\WinRAR\WinRAR.exe".to_string() }
fn default_folder_name() -> String { "Backups_Minecraft_Vanilla".to_string() }
fn default_email_enabled() -> bool { true }
fn default_smtp_host() -> String { "smtp.gmail.com".to_string() }
fn default_smtp_port() -> u16 { 465 }
