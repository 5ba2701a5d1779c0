//! Error types for lector-pe
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the lector-pe module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Pending queue errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Arrival feed errors (malformed events, bad base64 payloads)
    #[error("Feed error: {0}")]
    Feed(String),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the lector-pe Error
pub type Result<T> = std::result::Result<T, Error>;
