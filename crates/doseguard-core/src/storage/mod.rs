pub mod alarm_store;
mod config;
pub mod database;
pub mod handle_registry;
pub mod migrations;

pub use alarm_store::AlarmStore;
pub use config::{ApiConfig, Config, NotificationsConfig};
pub use database::Database;
pub use handle_registry::{ScheduleHandle, ScheduleHandleRegistry};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/doseguard[-dev]/` based on DOSEGUARD_ENV.
///
/// Set DOSEGUARD_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DOSEGUARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("doseguard-dev")
    } else {
        base_dir.join("doseguard")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
