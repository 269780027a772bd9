//! Logging setup
//!
//! Library code logs through the standard `log` macros. Applications that do
//! not install their own logger can call [`init_logging`] once at startup to
//! get `env_logger` output in text or JSON form.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_core::config::LoggingConfig;
//!
//! let config = LoggingConfig { level: "debug".into(), format: "json".into() };
//! tether_core::logging::init_logging(&config).unwrap();
//!
//! log::info!(target: "tether::session", "ready");
//! ```

use crate::config::LoggingConfig;
use chrono::{DateTime, Utc};
use std::io::Write;

/// Install the global logger
///
/// Safe to call more than once: a logger that is already installed is kept.
/// `RUST_LOG` still refines the configured level per target.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    config.validate()?;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.level_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    if config.is_json() {
        builder.format(|buf, record| {
            let line = json_line(Utc::now(), record.level(), record.target(), &record.args().to_string());
            writeln!(buf, "{}", line)
        });
    } else {
        builder.format_timestamp_millis().format_module_path(false);
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized, keeping it");
    }
    Ok(())
}

/// One JSON log line
fn json_line(timestamp: DateTime<Utc>, level: log::Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": timestamp.to_rfc3339(),
        "level": level.as_str(),
        "target": target,
        "message": message,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line() {
        let timestamp = DateTime::parse_from_rfc3339("2026-01-15T10:30:00Z").unwrap().with_timezone(&Utc);
        let line = json_line(timestamp, log::Level::Info, "tether::session", "created \"a\"");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["level"], "INFO");
        assert_eq!(value["target"], "tether::session");
        assert_eq!(value["message"], "created \"a\"");
        assert_eq!(value["timestamp"], "2026-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig { level: "chatty".into(), format: "text".into() };
        assert!(init_logging(&config).is_err());
    }
}
