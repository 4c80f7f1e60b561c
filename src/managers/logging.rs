//! Logging manager
//!
//! Provides dual-output logging:
//! - Console: INFO level with concise format
//! - File: one log per run, level from config, written synchronously so the
//!   file is complete by the time it is mailed

use super::context::{RunContext, LOG_FILE_EXTENSION, LOG_FILE_PREFIX};
use crate::config::GlobalConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for file output (console always uses INFO)
    pub log_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    /// Create from global config values
    pub fn from_config(global: &GlobalConfig) -> Self {
        Self {
            log_level: parse_level(&global.log_level),
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with console output and the run's log file
///
/// The returned guard names the file being written; keep it for the
/// duration of the run.
pub fn init_logging(ctx: &RunContext, config: &LoggingConfig) -> Result<LogGuard> {
    let log_dir = ctx.log_directory();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let file_name = format!("{}{}", LOG_FILE_PREFIX, ctx.run_id());
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .filename_suffix(LOG_FILE_EXTENSION)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file: {:?}", ctx.log_file()))?;

    // File layer: detailed format, no colors
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(config.log_level));

    // Console layer: INFO level, concise format
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install logging subscriber")?;

    Ok(LogGuard {
        log_file: ctx.log_file(),
    })
}

/// Initialize simple console-only logging (for when config isn't available)
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests); that one wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// Create a level filter for tracing layers
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("world_backup={},{}", level, level)))
}

/// Handle on the run's log file
pub struct LogGuard {
    log_file: PathBuf,
}

impl LogGuard {
    pub fn log_file(&self) -> &std::path::Path {
        &self.log_file
    }
}
