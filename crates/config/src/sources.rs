//! Syslog source configuration
//!
//! A source is an administrator-configured logical producer: a port, a
//! transport, and a host admission policy. Source records are owned by the
//! configuration store; this crate only describes their shape and validity.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Lowest port a source may bind (everything below is privileged)
pub const MIN_SOURCE_PORT: u16 = 1024;

/// Which transports a source listens on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// UDP datagrams only
    #[default]
    Udp,
    /// TCP with newline-delimited framing only
    Tcp,
    /// Both UDP and TCP on the same port
    Both,
}

impl Transport {
    /// Whether this transport includes a UDP socket
    #[inline]
    pub const fn wants_udp(self) -> bool {
        matches!(self, Self::Udp | Self::Both)
    }

    /// Whether this transport includes a TCP listener
    #[inline]
    pub const fn wants_tcp(self) -> bool {
        matches!(self, Self::Tcp | Self::Both)
    }

    /// Get string representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configured syslog source
///
/// # Example
///
/// ```toml
/// [[sources]]
/// id = "edge-fw"
/// slug = "edge-firewall"
/// port = 6514
/// transport = "both"
/// allowed_hosts = ["10.0.0.1", "10.0.0.2"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyslogSourceConfig {
    /// Opaque stable identifier (required)
    pub id: String,

    /// Human-chosen tag attached to every event this source produces (required)
    pub slug: String,

    /// Listen port, 1024-65535 (required)
    pub port: u16,

    /// Transport(s) to listen on
    /// Default: udp
    pub transport: Transport,

    /// Hosts admitted by exact match; empty means "accept any host"
    pub allowed_hosts: Vec<String>,

    /// Accept any host regardless of `allowed_hosts`
    /// Default: false
    pub auto_register_hosts: bool,

    /// When set, the source is revoked and gets no listener
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SyslogSourceConfig {
    /// A source is active until it is revoked
    #[inline]
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Validate identifier, slug, and port range
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ConfigError::invalid_value(
                "<unnamed>",
                "id",
                "must not be empty",
            ));
        }
        if self.slug.is_empty() {
            return Err(ConfigError::invalid_value(
                &self.id,
                "slug",
                "must not be empty",
            ));
        }
        if self.port < MIN_SOURCE_PORT {
            return Err(ConfigError::invalid_value(
                &self.id,
                "port",
                format!("must be {}-65535, got {}", MIN_SOURCE_PORT, self.port),
            ));
        }
        Ok(())
    }
}

/// Tuning knobs shared by all listeners
///
/// The idle timeout and connection cap bound resources that the syslog
/// protocol itself leaves unbounded; zero disables the idle timeout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenerTuning {
    /// Bind address for every listener
    /// Default: "0.0.0.0"
    pub bind_address: String,

    /// Maximum syslog message size
    /// Default: 8192 (8KB)
    pub max_message_size: usize,

    /// Socket receive buffer size (SO_RCVBUF)
    /// Default: 256KB
    pub recv_buffer_size: usize,

    /// Idle timeout for TCP connections (0 = no timeout)
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Maximum concurrent TCP connections per listener
    /// Default: 1024
    pub max_connections: usize,
}

impl Default for ListenerTuning {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            max_message_size: 8192,
            recv_buffer_size: 256 * 1024,
            idle_timeout: Duration::from_secs(300),
            max_connections: 1024,
        }
    }
}

/// Validate a full source list: per-source fields plus cross-source
/// id and port uniqueness (revoked sources don't hold ports)
pub fn validate_sources(sources: &[SyslogSourceConfig]) -> Result<()> {
    for source in sources {
        source.validate()?;
    }

    let mut seen_ids: Vec<&str> = Vec::with_capacity(sources.len());
    for source in sources {
        if seen_ids.contains(&source.id.as_str()) {
            return Err(ConfigError::duplicate_id(&source.id));
        }
        seen_ids.push(&source.id);
    }

    let active: Vec<&SyslogSourceConfig> = sources.iter().filter(|s| s.is_active()).collect();
    for (i, source) in active.iter().enumerate() {
        let clashing: Vec<&str> = active[i..]
            .iter()
            .filter(|other| other.port == source.port)
            .map(|other| other.id.as_str())
            .collect();
        if clashing.len() > 1 {
            return Err(ConfigError::duplicate_port(source.port, clashing.join(", ")));
        }
    }

    Ok(())
}
