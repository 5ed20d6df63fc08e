//! Installer gateway client errors

use thiserror::Error;

/// Errors that can occur when interacting with the installer gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway API returned an error
    #[error("Gateway API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed CSV)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
