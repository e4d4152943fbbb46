//! Parsed event representation
//!
//! `ParsedEvent` is what a listener hands to the ingestion pipeline: a
//! severity-derived level, the free-text message, and a flat string map of
//! whatever header fields the wire format carried. Events own no resources
//! and are never mutated after construction.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};

use crate::facility::Facility;

/// Metadata keys populated by the parser
pub mod meta {
    /// Textual facility name - always present
    pub const FACILITY: &str = "facility";
    /// Wire format (`rfc3164` / `rfc5424`) - always present
    pub const FORMAT: &str = "format";
    /// Sender hostname, when the header carried one
    pub const HOSTNAME: &str = "hostname";
    /// RFC 5424 APP-NAME, when not nil
    pub const APPNAME: &str = "appname";
    /// RFC 5424 PROCID, when not nil
    pub const PROCID: &str = "procid";
    /// RFC 5424 MSGID, when not nil
    pub const MSGID: &str = "msgid";
    /// RFC 5424 STRUCTURED-DATA, captured raw, when not nil
    pub const STRUCTURED_DATA: &str = "structured_data";
}

/// Log level derived from the syslog severity (PRI mod 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    /// Map a syslog severity (0-7) to a level
    ///
    /// Severities 0-3 (emergency through error) collapse to `Error`,
    /// 4 is `Warning`, 5-6 (notice, informational) are `Info`, 7 is `Debug`.
    pub const fn from_severity(severity: u8) -> Self {
        match severity {
            4 => Self::Warning,
            5 | 6 => Self::Info,
            7 => Self::Debug,
            _ => Self::Error,
        }
    }

    /// Get string representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Syslog wire format a message was parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyslogFormat {
    /// BSD syslog (`<PRI>Mon DD HH:MM:SS HOSTNAME ...`)
    Rfc3164,
    /// IETF syslog (`<PRI>1 TIMESTAMP HOSTNAME APP PROCID MSGID SD ...`)
    Rfc5424,
}

impl SyslogFormat {
    /// Get string representation (used as the `format` metadata value)
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfc3164 => "rfc3164",
            Self::Rfc5424 => "rfc5424",
        }
    }
}

impl std::fmt::Display for SyslogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured log event parsed from one raw syslog message
///
/// The timestamp preserves the sender's UTC offset as received; `None` means
/// the wire format carried no usable timestamp (RFC 3164 timestamps have no
/// year, RFC 5424 allows nil) and the consumer should stamp arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    /// Sender-reported timestamp, if one could be extracted
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Level derived from the PRI severity - never absent
    pub level: Level,

    /// Free-text message body, trailing whitespace trimmed,
    /// internal whitespace and newlines preserved verbatim
    pub message: String,

    /// Header fields as a flat string map (see [`meta`] for keys)
    pub metadata: BTreeMap<String, String>,
}

impl ParsedEvent {
    /// Sender timestamp normalized to UTC
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp.map(|ts| ts.with_timezone(&Utc))
    }

    /// Facility name from metadata
    pub fn facility(&self) -> Option<&str> {
        self.metadata.get(meta::FACILITY).map(String::as_str)
    }

    /// Wire format name from metadata
    pub fn format(&self) -> Option<&str> {
        self.metadata.get(meta::FORMAT).map(String::as_str)
    }
}

/// Base metadata shared by both formats
pub(crate) fn base_metadata(facility: Facility, format: SyslogFormat) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert(meta::FACILITY.to_string(), facility.as_str().to_string());
    metadata.insert(meta::FORMAT.to_string(), format.as_str().to_string());
    metadata
}
