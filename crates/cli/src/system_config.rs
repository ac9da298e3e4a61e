//! User configuration file
//!
//! Lives at `<config_dir>/settle/config.toml` unless `$SETTLE_CONFIG` points
//! elsewhere. A missing file means defaults.

use anyhow::{Context, Result};
use settle_core::SettleConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "SETTLE_CONFIG";

/// Resolve the config file path
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|dir| dir.join("settle").join("config.toml"))
}

/// Load the user config, falling back to defaults
pub fn load() -> Result<SettleConfig> {
    match config_file_path() {
        Some(path) => load_or_default(&path),
        None => {
            debug!("No config directory available, using defaults");
            Ok(SettleConfig::default())
        }
    }
}

/// Load `path` if it exists, otherwise return defaults
pub fn load_or_default(path: &Path) -> Result<SettleConfig> {
    if !path.exists() {
        debug!("Config file {} not found, using defaults", path.display());
        return Ok(SettleConfig::default());
    }

    SettleConfig::load_from(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Save the user config
pub fn save(config: &SettleConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    config
        .save_to(&path)
        .with_context(|| format!("Failed to save config to {}", path.display()))
}

/// Write a default config file if none exists, returning its path
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    init_at(&path)?;
    Ok(path)
}

/// Write the example config to `path` unless it already exists
pub fn init_at(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(true)
}

pub fn example_config() -> &'static str {
    settle_core::config::example_config()
}
