//! Error types for the nursery_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for nursery_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted record could not be written or cleared
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notification backend rejected a request
    #[error("Notification error: {0}")]
    Notification(String),

    /// A sleep timer is already running
    #[error("A sleep timer is already running for {baby_name} (started {started_at})")]
    TimerAlreadyRunning {
        baby_name: String,
        started_at: chrono::DateTime<chrono::Utc>,
    },

    /// Growth measurement outside the accepted domain
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Malformed user input (dates, enum names, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
