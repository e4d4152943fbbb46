//! Logwell - Pipeline seams
//!
//! The interfaces a listener produces into, and the channel-backed
//! implementations that connect them to the rest of the system.
//!
//! # Design
//!
//! - **Fire-and-forget ingestion**: [`EventSink::ingest`] must return in
//!   bounded, negligible time. The channel implementation uses `try_send`
//!   and drops on a full queue rather than stalling a read loop.
//! - **Diagnostics are data**: parse failures and bind failures are reported
//!   as structured [`Diagnostic`] entries, not just log lines, so storage
//!   and display can live elsewhere.
//! - **Memory implementations**: `MemorySink` / `MemoryDiagnostics` capture
//!   everything for tests and embedded use.

mod diagnostics;
mod sink;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, LogDiagnostics, MemoryDiagnostics};
pub use sink::{ChannelSink, EventSink, MemorySink, SourceEvent};
