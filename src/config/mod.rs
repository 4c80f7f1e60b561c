//! Configuration module for world-backup
//!
//! Loads the TOML configuration, expands `~` in every path and validates
//! the settings a run depends on before any logging to file starts.
//!
//! ## Example Usage
//!
//! ```no_run
//! use world_backup::config;
//!
//! let config = config::load_config("world-backup.toml")?;
//! println!("Saves: {:?}", config.global.saves_directory);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, resolve_smtp_password, ConfigError, Result, SMTP_PASSWORD_ENV};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
