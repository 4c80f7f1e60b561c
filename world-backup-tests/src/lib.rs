//! Test utilities for world-backup
//!
//! Shared builders, fixtures and re-exported mocks for the `unit` and
//! `commands` test targets.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockCompressor, MockStorage, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_world("Beta"));
//!     let mut manager = ctx.manager(MockCompressor::new(), MockStorage::new());
//!     let result = manager.run(&ctx.run_context()).unwrap();
//!     assert_eq!(result.success_count(), 2);
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use world_backup::config::{Config, LogPruneMode};
pub use world_backup::managers::accounting::{RunResult, TargetOutcome};
pub use world_backup::managers::backup::RunAbort;

// Re-export mock implementations from the main crate
pub use world_backup::utils::archiver::mock::MockCompressor;
pub use world_backup::utils::archiver::Compressor;
pub use world_backup::utils::executor::mock::{MockExecutor, MockResponse};
pub use world_backup::utils::executor::CommandExecutor;
pub use world_backup::utils::mailer::mock::MockMailer;
pub use world_backup::utils::mailer::Mailer;
pub use world_backup::utils::storage_ops::mock::{MockStorage, StorageCall};
pub use world_backup::utils::storage_ops::RemoteStorage;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
