//! Error types for the `provost` core library.

use thiserror::Error;

/// Result type alias using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for configuration handling.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
