//! Main Encore server client.

use crate::audio::AudioClient;
use crate::download::DownloadClient;
use crate::error::{Result, ServerClientError};
use crate::playback::PlaybackClient;
use crate::types::ServerConfig;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Retry-After used when a 429 carries no usable header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Client for the Encore media server.
///
/// Holds the base URL and bearer token; endpoint groups are reached through
/// [`EncoreServerClient::authorized`].
///
/// # Example
///
/// ```ignore
/// use encore_server_client::{EncoreServerClient, ServerConfig};
///
/// let client = EncoreServerClient::new(ServerConfig::with_token("https://music.example.com", "token"))?;
/// let handle = client.authorized().await?;
/// let stream_url = handle.audio().stream_url("dQw4w9WgXcQ").await?;
/// ```
pub struct EncoreServerClient {
    http: Client,
    config: Arc<RwLock<ServerConfig>>,
}

impl EncoreServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_timeouts(config, Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Create a client with explicit request and connect timeouts.
    pub fn with_timeouts(
        config: ServerConfig,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let url = normalize_base_url(&config.url)?;

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent())
            .build()
            .map_err(ServerClientError::Request)?;

        Ok(Self {
            http,
            config: Arc::new(RwLock::new(ServerConfig {
                url,
                access_token: config.access_token,
            })),
        })
    }

    /// Get the server URL.
    pub async fn url(&self) -> String {
        self.config.read().await.url.clone()
    }

    /// Check if the client has an access token.
    pub async fn is_authenticated(&self) -> bool {
        self.config.read().await.access_token.is_some()
    }

    /// Set the access token (e.g., from stored credentials).
    pub async fn set_access_token(&self, access_token: impl Into<String>) {
        self.config.write().await.access_token = Some(access_token.into());
    }

    /// Clear the stored token (logout).
    pub async fn clear_access_token(&self) {
        self.config.write().await.access_token = None;
        info!("Access token cleared");
    }

    /// Snapshot the URL and token for authenticated calls.
    ///
    /// Returns `AuthRequired` without touching the network when no token is
    /// configured.
    pub async fn authorized(&self) -> Result<AuthorizedHandle> {
        let config = self.config.read().await;
        let access_token = config
            .access_token
            .clone()
            .ok_or(ServerClientError::AuthRequired)?;
        let url = config.url.clone();
        drop(config);

        Ok(AuthorizedHandle {
            http: self.http.clone(),
            url,
            access_token,
        })
    }
}

/// URL and token captured for a series of authenticated calls.
pub struct AuthorizedHandle {
    http: Client,
    url: String,
    access_token: String,
}

impl AuthorizedHandle {
    /// Audio resolution and byte fetching.
    pub fn audio(&self) -> AudioClient<'_> {
        AudioClient::new(&self.http, &self.url, &self.access_token)
    }

    /// Download submission and status.
    pub fn downloads(&self) -> DownloadClient<'_> {
        DownloadClient::new(&self.http, &self.url, &self.access_token)
    }

    /// Playback session sync.
    pub fn playback(&self) -> PlaybackClient<'_> {
        PlaybackClient::new(&self.http, &self.url, &self.access_token)
    }
}

/// User agent advertised to the server; also names this device in sessions.
pub fn user_agent() -> String {
    format!(
        "Encore/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

fn normalize_base_url(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
    }

    let url = raw.trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ServerClientError::InvalidUrl(
            "URL must start with http:// or https://".into(),
        ));
    }
    url::Url::parse(&url).map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;

    Ok(url)
}

/// Turn a non-success response into an error
pub(crate) async fn error_for_response(response: Response) -> ServerClientError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => ServerClientError::AuthRequired,
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            ServerClientError::RateLimited { retry_after_secs }
        }
        _ => {
            let message = response.text().await.unwrap_or_default();
            ServerClientError::ServerError {
                status: status.as_u16(),
                message,
            }
        }
    }
}
