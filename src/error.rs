//! Error types for the room clock crate.

use thiserror::Error;

/// Errors that can occur while talking to the sensor or decoding data feeds.
#[derive(Debug, Error)]
pub enum Error {
    /// Register read or write failed on the bus (fatal to the current cycle)
    #[error("bus transfer failed: {0}")]
    Bus(String),

    /// `get_status`/`read` called before `initialize`
    #[error("sensor not initialized (call initialize() first)")]
    NotInitialized,

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Forecast payload could not be decoded
    #[error("forecast error: {0}")]
    Forecast(String),

    /// Speed test output could not be produced or decoded
    #[error("speed test error: {0}")]
    SpeedTest(String),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(String),

    /// File or process I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
