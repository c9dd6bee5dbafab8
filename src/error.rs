//! Error types for lv-capture.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for capture operations.
///
/// Every variant that reaches the top of the capture loop is fatal. Recoverable
/// conditions (unknown control lines, would-block reads, end of input) are
/// handled inside the loop and never become a `CaptureError`.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No log file path was configured.
    #[error("log file not configured (set LV_LOG_FILE or pass --log-file)")]
    LogFileNotConfigured,

    /// Appending a record to the log file failed.
    #[error("failed to write log file {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the preview to the terminal stream failed.
    #[error("failed to write terminal preview: {0}")]
    TerminalWrite(#[source] std::io::Error),

    /// The control channel could not be opened or configured.
    #[error("control channel {path}: {source}")]
    ControlChannel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The readiness multiplexer failed.
    #[error("poll failed: {0}")]
    Poll(#[source] std::io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
