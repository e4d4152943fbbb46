//! Common listener types
//!
//! Lock-free counters shared by the UDP and TCP receive paths of a
//! listener, snapshotted for status reporting and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one listener
///
/// For UDP, `messages_received` counts datagrams; for TCP it counts lines.
/// All fields use atomics for lock-free updates from concurrent tasks.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Messages received (before admission and parsing)
    pub messages_received: AtomicU64,

    /// Bytes received
    pub bytes_received: AtomicU64,

    /// Messages dropped by the admission policy
    pub messages_rejected: AtomicU64,

    /// Messages dropped for exceeding the size limit
    pub messages_oversized: AtomicU64,

    /// Messages that failed to parse
    pub parse_failures: AtomicU64,

    /// Events handed to the ingestion sink
    pub events_forwarded: AtomicU64,

    /// Currently open TCP connections
    pub connections_active: AtomicU64,

    /// Total TCP connections accepted
    pub connections_total: AtomicU64,

    /// Socket receive/accept errors
    pub recv_errors: AtomicU64,
}

impl ListenerMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            messages_oversized: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            events_forwarded: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
        }
    }

    /// Record a received message
    #[inline]
    pub fn message_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a message dropped by admission
    #[inline]
    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an oversized message
    #[inline]
    pub fn message_oversized(&self) {
        self.messages_oversized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a parse failure
    #[inline]
    pub fn parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event forwarded to the sink
    #[inline]
    pub fn event_forwarded(&self) {
        self.events_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted TCP connection
    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed TCP connection
    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a socket error
    #[inline]
    pub fn recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    pub fn snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            messages_oversized: self.messages_oversized.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of listener metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerMetricsSnapshot {
    pub messages_received: u64,
    pub bytes_received: u64,
    pub messages_rejected: u64,
    pub messages_oversized: u64,
    pub parse_failures: u64,
    pub events_forwarded: u64,
    pub connections_active: u64,
    pub connections_total: u64,
    pub recv_errors: u64,
}
