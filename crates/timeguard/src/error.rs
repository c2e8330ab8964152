//! Error types for the measurement engine.

use thiserror::Error;

/// Errors raised by the instrumentation layer itself.
///
/// Failures of a wrapped callable never show up here: an `Err` returned by
/// the target is handed back to the caller as-is and a panic is resumed with
/// its original payload.
#[derive(Debug, Error)]
pub enum GuardError {
    /// An unrecognized time or memory unit was supplied
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The memory-reading primitive is unavailable on this host
    #[error("Instrumentation unavailable: {0}")]
    InstrumentationUnavailable(String),

    /// Failed to read a settings file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse settings or configuration JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for instrumentation operations.
pub type GuardResult<T> = Result<T, GuardError>;
