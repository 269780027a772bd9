//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
const FORMATS: [&str; 2] = ["text", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level logged
    /// Env: TETHER_LOG_LEVEL
    /// Default: "info"
    pub level: String,

    /// Line format: "text" or "json"
    /// Env: TETHER_LOG_FORMAT
    /// Default: "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("TETHER_LOG_LEVEL") {
            self.level = level.trim().to_ascii_lowercase();
        }
        if let Ok(format) = env::var("TETHER_LOG_FORMAT") {
            self.format = format.trim().to_ascii_lowercase();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !LEVELS.contains(&self.level.as_str()) {
            bail!("Invalid log level '{}': must be one of {}", self.level, LEVELS.join(", "));
        }
        if !FORMATS.contains(&self.format.as_str()) {
            bail!("Invalid log format '{}': must be text or json", self.format);
        }
        Ok(())
    }

    /// Level as a `log` filter; unknown levels fall back to info
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}
