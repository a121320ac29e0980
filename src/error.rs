//! Error types for minimarket-guard.

use thiserror::Error;

/// Main error type for guard operations.
///
/// Only configuration loading and the HTTP transport can fail. The
/// coordinator absorbs every remote error into a local fallback, so these
/// never reach callers of the rate limit or breaker checks.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote procedure returned something we could not use
    #[error("Remote error: {0}")]
    Remote(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for GuardError {
    fn from(err: ::config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
