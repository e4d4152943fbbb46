//! Fleet error types

use thiserror::Error;

use logwell_sources::ListenerError;

/// Errors from fleet lifecycle operations
///
/// Each error is local to the one operation that produced it; the rest of
/// the fleet keeps running.
#[derive(Debug, Error)]
pub enum FleetError {
    /// A listener for this source id is already running
    #[error("source '{id}' already has a running listener")]
    AlreadyRunning { id: String },

    /// Starting the listener failed (typically a port conflict)
    #[error("failed to start listener for source '{id}': {source}")]
    Listener {
        id: String,
        #[source]
        source: ListenerError,
    },

    /// The configuration store could not be read
    #[error("configuration store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl FleetError {
    /// Create a Listener error
    pub fn listener(id: impl Into<String>, source: ListenerError) -> Self {
        Self::Listener {
            id: id.into(),
            source,
        }
    }

    /// Whether this failure is a socket bind conflict
    pub fn is_bind_failure(&self) -> bool {
        matches!(
            self,
            Self::Listener {
                source: ListenerError::Bind { .. },
                ..
            }
        )
    }
}
