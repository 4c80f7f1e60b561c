//! World Backup Library
//!
//! Compresses every world save under a saves directory, uploads the archives
//! to a Google Drive folder (replacing earlier copies in place) and mails the
//! run log afterwards.

pub mod config;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use managers::accounting::{RunResult, TargetOutcome};
pub use managers::backup::{BackupManager, BackupSettings, RunAbort};
pub use managers::context::RunContext;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
