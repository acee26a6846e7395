//! Error types for reel-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Recoverable engine failures (asset fetch, playback start, missing dataset)
//! never reach these variants; they are logged and published as events.

use thiserror::Error;

/// Main error type for reel-player
#[derive(Error, Debug)]
pub enum Error {
    /// Show file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Asset or dataset fetch errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Audio output errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Engine task has shut down and no longer accepts triggers
    #[error("Engine stopped")]
    EngineStopped,

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] reel_common::Error),
}

/// Convenience Result type using reel-player Error
pub type Result<T> = std::result::Result<T, Error>;
