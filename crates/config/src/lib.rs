//! Logwell - Configuration
//!
//! TOML-backed configuration: the daemon's own knobs plus the list of
//! syslog sources. Source records are owned by whatever manages the file;
//! the ingestion core consumes them read-only.
//!
//! # Example
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! queue_size = 2048
//!
//! [tuning]
//! idle_timeout = "5m"
//!
//! [[sources]]
//! id = "edge-fw"
//! slug = "edge-firewall"
//! port = 6514
//! transport = "both"
//! ```

mod error;
mod logging;
mod sources;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use sources::{
    ListenerTuning, MIN_SOURCE_PORT, SyslogSourceConfig, Transport, validate_sources,
};

use std::path::Path;

use serde::Deserialize;

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Internal logging
    pub log: LogConfig,

    /// Event channel capacity between listeners and the ingestion consumer
    /// Default: 1024
    pub queue_size: usize,

    /// Listener tuning knobs (shared by all sources)
    pub tuning: ListenerTuning,

    /// Configured syslog sources
    pub sources: Vec<SyslogSourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            queue_size: 1024,
            tuning: ListenerTuning::default(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the source list
    pub fn validate(&self) -> Result<()> {
        validate_sources(&self.sources)
    }

    /// Sources that should have a running listener
    pub fn active_sources(&self) -> Vec<SyslogSourceConfig> {
        self.sources.iter().filter(|s| s.is_active()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[log]
level = "debug"

queue_size = 512

[tuning]
max_message_size = 4096
idle_timeout = "1m"

[[sources]]
id = "edge-fw"
slug = "edge-firewall"
port = 6514
transport = "both"

[[sources]]
id = "core-rtr"
slug = "core-router"
port = 6515
allowed_hosts = ["192.168.1.1"]
"#;

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.queue_size, 512);
        assert_eq!(config.tuning.max_message_size, 4096);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].transport, Transport::Both);
        assert_eq!(config.sources[1].allowed_hosts, vec!["192.168.1.1"]);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.queue_size, 1024);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_port() {
        let toml = r#"
[[sources]]
id = "a"
slug = "a"
port = 80
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_active_sources_excludes_revoked() {
        let toml = r#"
[[sources]]
id = "a"
slug = "a"
port = 6514

[[sources]]
id = "b"
slug = "b"
port = 6515
revoked_at = "2026-01-01T00:00:00Z"
"#;
        let config = Config::from_toml(toml).unwrap();
        let active = config.active_sources();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Config::from_path("/nonexistent/logwell.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
