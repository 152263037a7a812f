//! CLI error types.

use std::io;

use eventbot_core::TracingError;
use eventbot_server::StoreError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end the `eventbot` process.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error on stdin/stdout.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Event store failure at startup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Logging could not be set up.
    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
