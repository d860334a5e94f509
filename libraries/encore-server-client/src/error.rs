//! Error types for the Encore server client.

use encore_core::EncoreError;
use thiserror::Error;

/// Errors that can occur when talking to an Encore server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Authentication required but no token available, or the token was rejected
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid server or stream URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Request exceeded its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limited by server
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
}

impl ServerClientError {
    /// Classify a transport error from `send()`
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::ServerUnreachable(e.to_string())
        } else {
            Self::Request(e)
        }
    }
}

impl From<ServerClientError> for EncoreError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::Request(e) if e.is_timeout() => Self::Timeout(e.to_string()),
            ServerClientError::Request(e) if e.is_decode() => Self::InvalidMessage(e.to_string()),
            ServerClientError::Request(e) => Self::Unreachable(e.to_string()),
            ServerClientError::ServerError { status, message } => Self::Remote { status, message },
            ServerClientError::AuthRequired => Self::NotAuthenticated,
            ServerClientError::InvalidUrl(msg) => Self::InvalidInput(msg),
            ServerClientError::ParseError(msg) => Self::InvalidMessage(msg),
            ServerClientError::ServerUnreachable(msg) => Self::Unreachable(msg),
            ServerClientError::Timeout(msg) => Self::Timeout(msg),
            ServerClientError::RateLimited { retry_after_secs } => {
                Self::RateLimited { retry_after_secs }
            }
        }
    }
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;
