//! Event sink - the ingestion seam
//!
//! Listeners forward parsed events here by value and never wait for an
//! acknowledgment. The channel implementation feeds a bounded crossfire
//! queue drained by whatever consumes events downstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossfire::{MAsyncTx, TrySendError};
use parking_lot::Mutex;

use logwell_protocol::ParsedEvent;

/// One parsed event tagged with the slug of the source that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    /// The source's human-chosen tag
    pub slug: String,
    /// The parsed event
    pub event: ParsedEvent,
}

/// Where listeners deliver parsed events
///
/// Implementations must not block: the caller is a socket read loop.
pub trait EventSink: Send + Sync {
    /// Deliver one event, best-effort
    fn ingest(&self, slug: &str, event: ParsedEvent);
}

/// Channel-backed sink feeding the ingestion pipeline
///
/// Events that don't fit in the bounded queue are dropped and counted;
/// a full pipeline must never stall a listener.
pub struct ChannelSink {
    tx: MAsyncTx<SourceEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink over a crossfire sender
    pub fn new(tx: MAsyncTx<SourceEvent>) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Number of events dropped because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn ingest(&self, slug: &str, event: ParsedEvent) {
        let item = SourceEvent {
            slug: slug.to_string(),
            event,
        };
        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(slug = %slug, "event queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(slug = %slug, "event queue closed, dropping event");
            }
        }
    }
}

impl std::fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSink")
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// In-memory sink capturing every event, for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SourceEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sink behind an `Arc` for sharing with listeners
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of captured events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been captured yet
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Copy out everything captured so far
    pub fn drain(&self) -> Vec<SourceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Snapshot of captured events without clearing
    pub fn events(&self) -> Vec<SourceEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for MemorySink {
    fn ingest(&self, slug: &str, event: ParsedEvent) {
        self.events.lock().push(SourceEvent {
            slug: slug.to_string(),
            event,
        });
    }
}
