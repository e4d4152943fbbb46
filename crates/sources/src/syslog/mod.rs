//! Syslog Listeners
//!
//! One listener per active source, receiving RFC 3164 and RFC 5424 syslog
//! over UDP datagrams and/or newline-delimited TCP on the source's port.
//!
//! # Design
//!
//! - All sockets are bound synchronously in [`SyslogListener::start`];
//!   the receive loops run as independent tasks afterwards.
//! - Admission and parsing happen per received unit; accepted events are
//!   forwarded to the ingestion sink with the source's slug attached.
//! - [`ListenerHandle`] is the only surface the lifecycle layer touches:
//!   runtime updates, metrics, a failure signal, and `stop()`.

mod listener;
mod tcp;
mod udp;

pub use listener::{ListenerError, ListenerHandle, SyslogListener};
