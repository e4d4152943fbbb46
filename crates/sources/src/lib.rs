//! Logwell - Sources
//!
//! Network listeners that receive syslog messages and produce parsed events
//! for the ingestion pipeline. One listener runs per active source and owns
//! up to two sockets (UDP and/or TCP) on the source's configured port.
//!
//! # Design Principles
//!
//! - **Isolation**: every listener, and every accepted TCP connection, runs
//!   as its own task. A slow peer or a dead source never stalls another.
//! - **Synchronous binds**: all sockets are bound before any task is
//!   spawned, so a port conflict surfaces to whoever asked for the listener.
//! - **Silent admission**: messages from unapproved hosts are dropped
//!   without an event or an error.
//! - **Absorb message failures**: parse failures become diagnostics, never
//!   faults.
//! - **Prompt shutdown**: [`ListenerHandle::stop`] cancels every task and
//!   waits for them, guaranteeing the port is free when it returns.
//!
//! # Example
//!
//! ```ignore
//! use logwell_sources::SyslogListener;
//!
//! let handle = SyslogListener::start(&config, &tuning, sink, diagnostics)?;
//! // ... later
//! handle.stop().await;
//! ```

mod admission;
mod common;
pub mod syslog;

pub use admission::{AdmissionPolicy, ListenerRuntime};
pub use common::{ListenerMetrics, ListenerMetricsSnapshot};
pub use syslog::{ListenerError, ListenerHandle, SyslogListener};
