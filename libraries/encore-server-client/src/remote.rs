//! Collaborator trait implementations used by the cache and sync services.

use crate::client::EncoreServerClient;
use async_trait::async_trait;
use encore_core::{
    DownloadApi, DownloadFilter, MediaSource, PlaybackSession, PlaybackSessionApi,
    PlaybackSyncRequest, RemoteDownload, Result, SubmittedDownload, TrackId,
};

#[async_trait]
impl MediaSource for EncoreServerClient {
    async fn is_authenticated(&self) -> bool {
        EncoreServerClient::is_authenticated(self).await
    }

    async fn resolve_stream_url(&self, id: &TrackId) -> Result<String> {
        let handle = self.authorized().await?;
        Ok(handle.audio().stream_url(id.as_str()).await?)
    }

    async fn fetch_audio(&self, stream_url: &str) -> Result<Vec<u8>> {
        let handle = self.authorized().await?;
        Ok(handle.audio().fetch(stream_url).await?)
    }
}

#[async_trait]
impl PlaybackSessionApi for EncoreServerClient {
    async fn is_authenticated(&self) -> bool {
        EncoreServerClient::is_authenticated(self).await
    }

    async fn push_session(&self, request: &PlaybackSyncRequest) -> Result<()> {
        let handle = self.authorized().await?;
        Ok(handle.playback().push(request).await?)
    }

    async fn fetch_session(&self) -> Result<Option<PlaybackSession>> {
        let handle = self.authorized().await?;
        Ok(handle.playback().fetch().await?)
    }

    async fn clear_session(&self) -> Result<()> {
        let handle = self.authorized().await?;
        Ok(handle.playback().clear().await?)
    }
}

#[async_trait]
impl DownloadApi for EncoreServerClient {
    async fn submit_downloads(
        &self,
        urls: &[String],
        auto_start: bool,
    ) -> Result<Vec<SubmittedDownload>> {
        let handle = self.authorized().await?;
        Ok(handle.downloads().submit(urls, auto_start).await?)
    }

    async fn list_downloads(&self, filter: DownloadFilter) -> Result<Vec<RemoteDownload>> {
        let handle = self.authorized().await?;
        Ok(handle.downloads().list(filter).await?)
    }
}
