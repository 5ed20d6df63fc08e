//! PowerFlex client errors

use thiserror::Error;

/// Errors that can occur when interacting with the PowerFlex array API
#[derive(Debug, Error)]
pub enum PowerFlexError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// PowerFlex API returned an error
    #[error("PowerFlex API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (bad credentials, expired token, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PowerFlexError {
    /// True when the array answered but nothing matched.
    ///
    /// Callers use this to tell "not installed yet" apart from transport failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PowerFlexError::NotFound(_))
    }
}
