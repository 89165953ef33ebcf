//! Runtime configuration
//!
//! Values come from the process environment (a `.env` file is loaded by the
//! binaries before this runs). Anything missing or malformed falls back to a
//! default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_DATABASE_PATH: &str = "pages.db";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct CmsConfig {
    /// SQLite file holding the `pages` and `page_history` tables
    pub database_path: PathBuf,
    pub bind_host: String,
    pub port: u16,
    /// Write history events alongside every mutation
    pub track_history: bool,
    /// How long a writer waits on the database lock before failing
    pub busy_timeout: Duration,
    pub otlp_enabled: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            track_history: true,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            otlp_enabled: false,
            log_dir: None,
        }
    }
}

impl CmsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid PORT '{}', using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => defaults.port,
        };

        let busy_timeout = match lookup("CMS_BUSY_TIMEOUT_MS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    warn!("Ignoring invalid CMS_BUSY_TIMEOUT_MS '{}'", raw);
                    defaults.busy_timeout
                }
            },
            None => defaults.busy_timeout,
        };

        Self {
            database_path: lookup("CMS_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            bind_host: lookup("CMS_BIND_HOST").unwrap_or(defaults.bind_host),
            port,
            track_history: lookup("TRACK_HISTORY")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.track_history),
            busy_timeout,
            otlp_enabled: lookup("CMS_OTLP_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            log_dir: lookup("CMS_LOG_DIR").filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CmsConfig::from_lookup(|_| None);
        assert_eq!(config, CmsConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_overrides() {
        let config = CmsConfig::from_lookup(lookup_from(&[
            ("CMS_DATABASE_PATH", "/tmp/report.db"),
            ("PORT", "8080"),
            ("TRACK_HISTORY", "false"),
            ("CMS_BUSY_TIMEOUT_MS", "250"),
        ]));
        assert_eq!(config.database_path, PathBuf::from("/tmp/report.db"));
        assert_eq!(config.port, 8080);
        assert!(!config.track_history);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = CmsConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("CMS_BUSY_TIMEOUT_MS", "-3"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.busy_timeout, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));
    }
}
