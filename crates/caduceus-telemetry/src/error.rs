//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing the logging subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level, format or directive could not be parsed.
    #[error("Invalid log configuration: {0}")]
    ConfigError(String),

    /// A global subscriber is already installed, or installation failed.
    #[error("Failed to install log subscriber: {0}")]
    InitError(String),

    /// The log directory could not be created.
    #[error("Log directory error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
