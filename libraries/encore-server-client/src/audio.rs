//! Audio resolution for prefetching.

use crate::client::error_for_response;
use crate::error::{Result, ServerClientError};
use crate::types::StreamUrlResponse;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Audio client for the Encore server.
pub struct AudioClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> AudioClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Resolve the playable stream URL for a track.
    ///
    /// Relative URLs from the server are made absolute against the base URL.
    pub async fn stream_url(&self, track_id: &str) -> Result<String> {
        let mut url = self.base()?;
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["audio", track_id, "player"]);
        debug!(url = %url, track_id = %track_id, "Resolving stream URL");

        let response = self
            .http
            .get(url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body: StreamUrlResponse = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse stream URL response: {}", e))
        })?;

        self.absolute(&body.stream_url).map(String::from)
    }

    /// Fetch the bytes behind a stream URL.
    ///
    /// The access token is only sent to the server's own origin.
    pub async fn fetch(&self, stream_url: &str) -> Result<Vec<u8>> {
        let url = self.absolute(stream_url)?;
        let same_origin = url.origin() == self.base()?.origin();
        debug!(url = %url, same_origin, "Fetching audio");

        let mut request = self.http.get(url.clone());
        if same_origin {
            request = request.bearer_auth(self.access_token);
        }
        let response = request.send().await.map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let bytes = response.bytes().await?;
        debug!(url = %url, size_bytes = bytes.len(), "Fetched audio");
        Ok(bytes.to_vec())
    }

    /// Base URL with a trailing slash so joins keep its path
    fn base(&self) -> Result<Url> {
        Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| ServerClientError::InvalidUrl(e.to_string()))
    }

    fn absolute(&self, stream_url: &str) -> Result<Url> {
        if stream_url.starts_with("http://") || stream_url.starts_with("https://") {
            return Url::parse(stream_url).map_err(|e| ServerClientError::InvalidUrl(e.to_string()));
        }

        self.base()?
            .join(stream_url.trim_start_matches('/'))
            .map_err(|e| ServerClientError::InvalidUrl(e.to_string()))
    }
}
