//! Configuration system for Tether
//!
//! # Configuration Hierarchy
//!
//! Configuration values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (builders on the session components) - Highest priority
//! 2. **Environment Variables** (`TETHER_SESSION_*`, `TETHER_LOG_*`) - Override file config
//! 3. **Config File** (config.toml) - Override defaults
//! 4. **Defaults** - Lowest priority
//!
//! # Example
//!
//! ```no_run
//! use tether_core::config::TetherConfig;
//!
//! // Load with full supersedence
//! let config = TetherConfig::load()?;
//! let resolver = config.sessions.build_resolver()?;
//!
//! // Or load from specific file
//! let config = TetherConfig::from_file("config.toml")?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! A config file only needs the values it overrides:
//!
//! ```toml
//! [sessions]
//! transport = "cookie+header"
//! header_names = ["X-Auth-Token", "Authentication-Info"]
//! cookie_same_site = "Strict"
//!
//! [logging]
//! level = "debug"
//! ```

pub mod logging;
pub mod sessions;

pub use logging::LoggingConfig;
pub use sessions::{SessionTransport, SessionsConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete Tether configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

impl TetherConfig {
    /// Load configuration with full supersedence chain
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file, then apply the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();

        config.validate().with_context(|| format!("Invalid configuration ({})", path.display()))?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.sessions.merge(other.sessions);
        self.logging.merge(other.logging);
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.sessions.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.sessions.validate().context("sessions")?;
        self.logging.validate().context("logging")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TetherConfig::default();
        assert_eq!(config.sessions.cookie_name, "SESSION");
        assert_eq!(config.sessions.cookie_same_site, "Lax");
        assert!(config.sessions.cookie_http_only);
        assert!(!config.sessions.crawler_enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = TetherConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: TetherConfig = toml::from_str(
            r#"
            [sessions]
            transport = "header"
            header_names = ["Authentication-Info"]
            "#,
        )
        .unwrap();
        assert_eq!(config.sessions.transport, SessionTransport::Header);
        assert_eq!(config.sessions.cookie_name, "SESSION");
        assert_eq!(config.logging.format, "text");
    }
}
