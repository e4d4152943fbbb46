//! Logwell - Syslog protocol
//!
//! Wire-format parsing for syslog messages as received off the network.
//!
//! # Supported formats
//!
//! - **RFC 3164** (BSD syslog) - Legacy format, still widely used
//! - **RFC 5424** (IETF syslog) - Versioned header with structured data
//!
//! # Design Principles
//!
//! - **Pure parsing**: `parse()` is a pure function of its input - no I/O,
//!   no clock, no shared state. Re-parsing the same bytes always yields an
//!   identical event.
//! - **Degrade, don't reject**: once the `<PRI>` header is valid, an RFC 3164
//!   body that doesn't match the expected shape becomes a raw message rather
//!   than a parse error. Only garbage input fails.
//! - **Raw structured data**: RFC 5424 `[...]` groups are captured as one
//!   opaque string, not deep-parsed.
//!
//! # Example
//!
//! ```
//! use logwell_protocol::{parse, Level};
//!
//! let event = parse("<34>Oct 11 22:14:15 mymachine su: 'su root' failed").unwrap();
//! assert_eq!(event.level, Level::Error);
//! assert_eq!(event.message, "su: 'su root' failed");
//! assert_eq!(event.metadata["hostname"], "mymachine");
//! ```

mod error;
mod event;
mod facility;
mod parse;

pub use error::ParseError;
pub use event::{Level, ParsedEvent, SyslogFormat, meta};
pub use facility::Facility;
pub use parse::parse;

/// Maximum valid PRI value (`23 * 8 + 7`)
pub const MAX_PRIORITY: u8 = 191;
