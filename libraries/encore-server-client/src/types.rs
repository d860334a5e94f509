//! Request and response types for the Encore server API.

use serde::{Deserialize, Serialize};

/// Configuration for connecting to an Encore server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "https://music.example.com")
    pub url: String,
    /// Bearer token sent with every request (if authenticated)
    pub access_token: Option<String>,
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
        }
    }

    /// Create a config with an existing token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: Some(access_token.into()),
        }
    }
}

/// Response of `GET /audio/{id}/player`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamUrlResponse {
    /// Absolute URL, or a path relative to the server base URL
    pub stream_url: String,
}

/// Body of `POST /download`.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitDownloadsRequest<'a> {
    pub urls: &'a [String],
    pub auto_start: bool,
}
