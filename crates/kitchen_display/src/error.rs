//! Display client error types.

use thiserror::Error;

/// Display client error type.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// HTTP request to the gateway failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error status.
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid gateway URL.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Feed connection failure.
    #[error("Feed error: {0}")]
    Feed(#[from] common::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for display operations.
pub type Result<T> = std::result::Result<T, DisplayError>;
