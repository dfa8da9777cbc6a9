//! Error types for the migration toolkit.
//!
//! Every fallible library operation returns [`MigrateError`]. The pipeline
//! decides per call site whether an error is fatal to the run (configuration),
//! fatal to one model, or only to one insert batch.

use std::path::PathBuf;
use thiserror::Error;

/// Which of the two stores an operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSide {
    Source,
    Destination,
}

impl StoreSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreSide::Source => "source",
            StoreSide::Destination => "destination",
        }
    }
}

impl std::fmt::Display for StoreSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the migration toolkit.
#[derive(Debug, Error)]
pub enum MigrateError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("{store} store returned HTTP {status} for {table}: {message}")]
    RemoteStatus {
        store: String,
        table: String,
        status: u16,
        message: String,
    },

    // Lookup errors
    #[error("Model '{name}' not found in {side}")]
    ModelNotFound { name: String, side: StoreSide },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

impl From<std::io::Error> for MigrateError {
    fn from(err: std::io::Error) -> Self {
        MigrateError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MigrateError {
    fn from(err: serde_json::Error) -> Self {
        MigrateError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MigrateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MigrateError::Timeout(err.to_string())
        } else {
            MigrateError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl MigrateError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MigrateError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Config {
            message: message.into(),
        }
    }
}
