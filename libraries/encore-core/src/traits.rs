/// Remote collaborator traits
///
/// The cache and sync subsystems never talk HTTP directly; they go through
/// these seams so the server client can be swapped for fakes in tests.
use crate::error::Result;
use crate::types::{
    DownloadFilter, PlaybackSession, PlaybackSyncRequest, RemoteDownload, SubmittedDownload,
    TrackId,
};
use async_trait::async_trait;

/// Source of audio bytes for prefetching
///
/// Fetching is a two-step indirection: resolve a playable URL for the track,
/// then fetch the bytes behind it. Either step may fail independently.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Whether credentials are available; unauthenticated callers short-circuit
    async fn is_authenticated(&self) -> bool;

    /// Resolve the playable stream URL for a track
    ///
    /// # Errors
    /// Returns an error if the track cannot be resolved or the request fails
    async fn resolve_stream_url(&self, id: &TrackId) -> Result<String>;

    /// Fetch the bytes behind a stream URL
    ///
    /// # Errors
    /// Returns an error if the request fails or the body cannot be read
    async fn fetch_audio(&self, stream_url: &str) -> Result<Vec<u8>>;
}

/// Remote "resume playback" session record
#[async_trait]
pub trait PlaybackSessionApi: Send + Sync {
    /// Whether credentials are available
    async fn is_authenticated(&self) -> bool;

    /// Push this device's playback state
    async fn push_session(&self, request: &PlaybackSyncRequest) -> Result<()>;

    /// Fetch the last stored session, `None` when no session exists
    async fn fetch_session(&self) -> Result<Option<PlaybackSession>>;

    /// Delete the stored session
    async fn clear_session(&self) -> Result<()>;
}

/// Remote download submission
#[async_trait]
pub trait DownloadApi: Send + Sync {
    /// Submit URLs for server-side download
    async fn submit_downloads(
        &self,
        urls: &[String],
        auto_start: bool,
    ) -> Result<Vec<SubmittedDownload>>;

    /// List downloads the server still considers in progress
    async fn list_downloads(&self, filter: DownloadFilter) -> Result<Vec<RemoteDownload>>;
}
