//! Configuration error taxonomy.
//!
//! Everything in here is fatal: configuration errors are raised before any
//! chain interaction starts and are never retried.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration-level operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    MalformedConfig(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
}

impl ConfigError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ConfigError::MalformedConfig(message.into())
    }
}
