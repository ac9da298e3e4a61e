//! Configuration for settle
//!
//! Loaded from TOML. Every field has a default, so a partial (or empty) file
//! is valid.

use crate::debouncer::delay_from_millis;
use crate::error::{DebounceError, Result};
use crate::scheduler::SchedulerKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Upper bound for `debounce.delay_ms` (one hour)
pub const MAX_DELAY_MS: i64 = 3_600_000;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub debounce: DebounceConfig,
    pub keyed: KeyedConfig,
}

/// `[debounce]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds
    pub delay_ms: i64,
    /// Timer backend
    pub scheduler: SchedulerKind,
}

/// `[keyed]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyedConfig {
    /// Separates the key from the payload in keyed input
    pub separator: String,
    /// Drop idle per-key debouncers as input arrives
    pub purge_idle: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            scheduler: SchedulerKind::default(),
        }
    }
}

impl Default for KeyedConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
            purge_idle: true,
        }
    }
}

impl SettleConfig {
    /// Check all values are within range
    pub fn validate(&self) -> Result<()> {
        delay_from_millis(self.debounce.delay_ms)?;

        if self.debounce.delay_ms > MAX_DELAY_MS {
            return Err(DebounceError::InvalidArgument(format!(
                "debounce.delay_ms must be at most {}, got {}",
                MAX_DELAY_MS, self.debounce.delay_ms
            )));
        }

        if self.keyed.separator.is_empty() {
            return Err(DebounceError::InvalidArgument(
                "keyed.separator must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured quiet period
    pub fn delay(&self) -> Result<Duration> {
        delay_from_millis(self.debounce.delay_ms)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SettleConfig = toml::from_str(text)
            .map_err(|e| DebounceError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DebounceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_toml(&text)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate and write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let text = toml::to_string_pretty(self)
            .map_err(|e| DebounceError::Config(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DebounceError::Config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, text).map_err(|e| {
            DebounceError::Config(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

/// Annotated example config file
pub fn example_config() -> &'static str {
    r#"# settle configuration

[debounce]
# Quiet period in milliseconds (0 - 3600000)
delay_ms = 300
# Timer backend: "tokio" or "thread"
scheduler = "tokio"

[keyed]
# Separates key from payload in keyed mode ("key:payload")
separator = ":"
# Drop idle per-key debouncers as input arrives
purge_idle = true
"#
}
