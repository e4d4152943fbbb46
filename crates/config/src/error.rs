//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error - invalid value on a source
    #[error("source '{source_id}' has invalid {field}: {message}")]
    InvalidValue {
        /// Id of the offending source
        source_id: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Validation error - two active sources share a port
    #[error("port {port} is used by multiple sources: {sources}")]
    DuplicatePort {
        /// The conflicting port
        port: u16,
        /// Ids of the sources using this port
        sources: String,
    },

    /// Validation error - two sources share an id
    #[error("source id '{id}' appears more than once")]
    DuplicateId {
        /// The repeated id
        id: String,
    },
}

impl ConfigError {
    /// Create an Io error
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        source_id: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            source_id: source_id.into(),
            field,
            message: message.into(),
        }
    }

    /// Create a DuplicatePort error
    pub fn duplicate_port(port: u16, sources: impl Into<String>) -> Self {
        Self::DuplicatePort {
            port,
            sources: sources.into(),
        }
    }

    /// Create a DuplicateId error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }
}
