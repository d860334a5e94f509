//! Remote "resume playback" session.

use crate::client::error_for_response;
use crate::error::{Result, ServerClientError};
use encore_core::{PlaybackSession, PlaybackSyncRequest};
use reqwest::{Client, StatusCode};
use tracing::debug;

/// Playback session client for the Encore server.
pub struct PlaybackClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> PlaybackClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/playback-sync", self.base_url)
    }

    /// Store this device's playback state.
    pub async fn push(&self, request: &PlaybackSyncRequest) -> Result<()> {
        debug!(track_id = %request.youtube_id, position = request.position, "Pushing playback session");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.access_token)
            .json(request)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_for_response(response).await)
        }
    }

    /// Last stored session, `None` when the server has none (404).
    pub async fn fetch(&self) -> Result<Option<PlaybackSession>> {
        let response = self
            .http
            .get(self.endpoint())
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_for_response(response).await);
        }

        let session: PlaybackSession = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse playback session: {}", e))
        })?;
        Ok(Some(session))
    }

    /// Delete the stored session.
    pub async fn clear(&self) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint())
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        // Nothing to delete is fine
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(error_for_response(response).await)
        }
    }
}
