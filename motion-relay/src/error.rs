//! Error types for motion-relay
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for motion-relay
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Serial link failed while reading or writing
    #[error("Transport error: {0}")]
    Transport(std::io::Error),

    /// File and socket I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Errors from the shared core
    #[error(transparent)]
    Common(#[from] motion_common::Error),
}

/// Convenience Result type using motion-relay Error
pub type Result<T> = std::result::Result<T, Error>;
