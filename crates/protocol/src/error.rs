//! Parse error types
//!
//! A message either parses or it doesn't: malformed `<PRI>` headers and
//! truncated RFC 5424 headers are the only hard failures. Everything else
//! degrades to a raw-message event.

use thiserror::Error;

/// Errors that can occur when parsing a syslog message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input is not a syslog message (bad PRI header or truncated body)
    #[error("invalid syslog format: {reason}")]
    InvalidFormat {
        /// What exactly failed to match
        reason: &'static str,
    },
}

impl ParseError {
    /// Create an invalid format error
    #[inline]
    pub const fn invalid_format(reason: &'static str) -> Self {
        Self::InvalidFormat { reason }
    }
}
