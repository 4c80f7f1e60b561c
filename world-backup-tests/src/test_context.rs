//! Test context and harness
//!
//! Bundles a configuration, its temp directory and the mock collaborators a
//! backup run needs.

use crate::config_builder::ConfigBuilder;
use anyhow::Result;
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use world_backup::config::Config;
use world_backup::managers::backup::{BackupManager, BackupSettings};
use world_backup::managers::context::RunContext;
use world_backup::utils::archiver::mock::MockCompressor;
use world_backup::utils::storage_ops::mock::MockStorage;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    /// The test configuration
    config: Option<Config>,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            config: None,
        }
    }

    /// Create a test context from a ConfigBuilder
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();

        Self {
            temp_dir,
            config: Some(config),
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the configuration
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    fn required_config(&self) -> &Config {
        self.config
            .as_ref()
            .expect("TestContext was created without a configuration")
    }

    pub fn staging_dir(&self) -> &Path {
        &self.required_config().global.staging_directory
    }

    pub fn log_dir(&self) -> &Path {
        &self.required_config().global.log_directory
    }

    /// Run context with a fixed start time
    pub fn run_context(&self) -> RunContext {
        let started = Local
            .with_ymd_and_hms(2026, 10, 15, 1, 30, 0)
            .single()
            .expect("Unambiguous local time");
        RunContext::new(started, self.log_dir())
    }

    /// Backup manager wired to the given mocks
    pub fn manager(
        &self,
        compressor: MockCompressor,
        storage: MockStorage,
    ) -> BackupManager<MockCompressor, MockStorage> {
        BackupManager::new(
            BackupSettings::from_config(self.required_config()),
            compressor,
            storage,
        )
    }

    /// Create a subdirectory in the temp dir
    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Check if a file exists in the temp directory
    pub fn file_exists(&self, name: &str) -> bool {
        self.temp_dir.path().join(name).exists()
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}
