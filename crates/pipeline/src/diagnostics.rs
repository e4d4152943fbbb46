//! Diagnostics seam
//!
//! Parse failures and bind failures are reported as structured entries so an
//! external observability layer can store or display them. This crate only
//! defines the shape and a tracing-backed default.

use parking_lot::Mutex;

/// What kind of failure a diagnostic describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A received message failed to parse and was dropped
    ParseFailure,
    /// A listener could not bind its socket(s)
    BindFailure,
    /// A listener's receive task exited without being stopped
    ListenerExit,
}

impl DiagnosticKind {
    /// Get string representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseFailure => "parse_failure",
            Self::BindFailure => "bind_failure",
            Self::ListenerExit => "listener_exit",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Id of the source the failure belongs to
    pub source_id: String,
    /// Failure category
    pub kind: DiagnosticKind,
    /// Human-readable reason
    pub detail: String,
    /// Length of the offending raw message, when there was one
    pub raw_len: Option<usize>,
}

impl Diagnostic {
    /// Diagnostic for a message that failed to parse
    pub fn parse_failure(source_id: impl Into<String>, detail: impl Into<String>, raw_len: usize) -> Self {
        Self {
            source_id: source_id.into(),
            kind: DiagnosticKind::ParseFailure,
            detail: detail.into(),
            raw_len: Some(raw_len),
        }
    }

    /// Diagnostic for a failed socket bind
    pub fn bind_failure(source_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind: DiagnosticKind::BindFailure,
            detail: detail.into(),
            raw_len: None,
        }
    }

    /// Diagnostic for a listener task that died unexpectedly
    pub fn listener_exit(source_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind: DiagnosticKind::ListenerExit,
            detail: detail.into(),
            raw_len: None,
        }
    }
}

/// Where listeners and the fleet report diagnostics
pub trait DiagnosticsSink: Send + Sync {
    /// Record one diagnostic entry
    fn report(&self, diagnostic: Diagnostic);
}

/// Default diagnostics sink - emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(
            source_id = %diagnostic.source_id,
            kind = %diagnostic.kind,
            detail = %diagnostic.detail,
            raw_len = ?diagnostic.raw_len,
            "listener diagnostic"
        );
    }
}

/// In-memory diagnostics sink for tests
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemoryDiagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Count of entries of one kind
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries.lock().iter().filter(|d| d.kind == kind).count()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let d = Diagnostic::parse_failure("src-1", "invalid syslog format", 42);
        assert_eq!(d.kind, DiagnosticKind::ParseFailure);
        assert_eq!(d.raw_len, Some(42));

        let d = Diagnostic::bind_failure("src-1", "address in use");
        assert_eq!(d.kind, DiagnosticKind::BindFailure);
        assert_eq!(d.raw_len, None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DiagnosticKind::ParseFailure.to_string(), "parse_failure");
        assert_eq!(DiagnosticKind::BindFailure.to_string(), "bind_failure");
        assert_eq!(DiagnosticKind::ListenerExit.to_string(), "listener_exit");
    }

    #[test]
    fn test_memory_diagnostics() {
        let sink = MemoryDiagnostics::new();
        sink.report(Diagnostic::parse_failure("a", "bad", 1));
        sink.report(Diagnostic::bind_failure("b", "in use"));

        assert_eq!(sink.entries().len(), 2);
        assert_eq!(sink.count_of(DiagnosticKind::ParseFailure), 1);
        assert_eq!(sink.count_of(DiagnosticKind::BindFailure), 1);
        assert_eq!(sink.count_of(DiagnosticKind::ListenerExit), 0);
    }
}
