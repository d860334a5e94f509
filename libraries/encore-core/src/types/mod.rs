mod analytics;
mod cache;
mod download;
mod ids;
mod playback;

pub use analytics::PlayAnalyticsEntry;
pub use cache::{CacheEntrySummary, CacheMetadataEntry, CacheStats, CachedBlobEntry, TrackDetails};
pub use download::{
    DownloadFilter, DownloadStatus, EnqueueOutcome, PendingDownload, RemoteDownload,
    SubmittedDownload,
};
pub use ids::{DownloadId, TrackId};
pub use playback::{PlaybackSession, PlaybackSnapshot, PlaybackSyncRequest};
