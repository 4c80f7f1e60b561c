//! Fluent API for building test configurations
//!
//! Every builder owns a temp directory laid out like a real installation:
//! `saves/`, `staging/`, `logs/` plus Drive credential and token files.

use crate::fixtures::{credentials_json, token_json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use world_backup::config::{
    ArchiverBackend, ArchiverConfig, Config, DriveConfig, EmailConfig, GlobalConfig, LogPruneMode,
};

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    archiver: ArchiverConfig,
    drive: DriveConfig,
    email: EmailConfig,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with minimal defaults
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        for dir in ["saves", "staging", "logs"] {
            fs::create_dir_all(root.join(dir)).expect("Failed to create directory");
        }

        let credentials_file = root.join("credentials.json");
        fs::write(&credentials_file, credentials_json()).expect("Failed to write credentials");
        let token_file = root.join("token.json");
        fs::write(&token_file, token_json()).expect("Failed to write token");

        let global = GlobalConfig {
            saves_directory: root.join("saves"),
            staging_directory: root.join("staging"),
            archive_extension: "zip".to_string(),
            exclude: vec![],
            log_directory: root.join("logs"),
            log_level: "info".to_string(),
            log_retention: 5,
            log_prune_mode: LogPruneMode::PurgeAll,
        };

        Self {
            temp_dir,
            global,
            archiver: ArchiverConfig {
                backend: ArchiverBackend::Builtin,
                program: r"C:\Program Files\WinRAR\WinRAR.exe".to_string(),
            },
            drive: DriveConfig {
                folder_name: "Backups_Test".to_string(),
                credentials_file,
                token_file,
            },
            email: EmailConfig::default(),
        }
    }

    /// Create a minimal config with one world save
    pub fn minimal() -> Self {
        Self::new().add_world("Alpha")
    }

    /// Add a world save directory with a couple of files in it
    pub fn add_world(self, name: &str) -> Self {
        crate::fixtures::populate_world(&self.global.saves_directory, name);
        self
    }

    /// Add several world saves
    pub fn add_worlds(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.add_world(name);
        }
        self
    }

    /// Set the saves directory
    pub fn with_saves_dir(mut self, path: &Path) -> Self {
        self.global.saves_directory = path.to_path_buf();
        self
    }

    /// Set the archive extension
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.global.archive_extension = ext.to_string();
        self
    }

    /// Exclude a world by name
    pub fn exclude(mut self, name: &str) -> Self {
        self.global.exclude.push(name.to_string());
        self
    }

    /// Set log retention
    pub fn with_log_retention(mut self, limit: usize, mode: LogPruneMode) -> Self {
        self.global.log_retention = limit;
        self.global.log_prune_mode = mode;
        self
    }

    /// Use the external archiver backend with the given program
    pub fn with_external_archiver(mut self, program: &str) -> Self {
        self.archiver = ArchiverConfig {
            backend: ArchiverBackend::External,
            program: program.to_string(),
        };
        self
    }

    /// Set the Drive folder name
    pub fn with_folder_name(mut self, name: &str) -> Self {
        self.drive.folder_name = name.to_string();
        self
    }

    /// Point the token file somewhere else
    pub fn with_token_file(mut self, path: &Path) -> Self {
        self.drive.token_file = path.to_path_buf();
        self
    }

    /// Enable email with a password file
    pub fn with_email(mut self, sender: &str, recipient: &str, password: &str) -> Self {
        let password_file = self.temp_dir.path().join("smtp-password");
        fs::write(&password_file, password).expect("Failed to write password file");

        self.email = EmailConfig {
            enabled: true,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            password_file: Some(password_file),
            ..EmailConfig::default()
        };
        self
    }

    /// Enable email without a password file
    pub fn with_email_from_env(mut self, sender: &str, recipient: &str) -> Self {
        self.email = EmailConfig {
            enabled: true,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            password_file: None,
            ..EmailConfig::default()
        };
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn saves_dir(&self) -> &Path {
        &self.global.saves_directory
    }

    pub fn staging_dir(&self) -> &Path {
        &self.global.staging_directory
    }

    pub fn log_dir(&self) -> &Path {
        &self.global.log_directory
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Keep the temp directory (don't delete on drop)
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            archiver: self.archiver,
            drive: self.drive,
            email: self.email,
        };
        (config, self.temp_dir)
    }

    /// Write the configuration as TOML next to the test files
    pub fn persist_to_file(self) -> (PathBuf, Config, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("world-backup.toml");
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, toml_str).expect("Failed to write config");
        (path, config, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
