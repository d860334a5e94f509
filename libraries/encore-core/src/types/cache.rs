/// Cached audio payloads and their listing metadata
use super::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached audio payload with its recency bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBlobEntry {
    /// Track the payload belongs to
    pub id: TrackId,
    /// Raw audio bytes
    pub payload: Vec<u8>,
    /// Payload length in bytes
    pub size_bytes: u64,
    /// When the payload was written
    pub cached_at: DateTime<Utc>,
    /// Last time the payload was read (or written)
    pub last_accessed_at: DateTime<Utc>,
    /// Number of reads since the payload was written
    pub access_count: u32,
    /// Track duration, when known
    pub duration_seconds: Option<f64>,
}

/// Blob bookkeeping without the payload
///
/// This is what eviction iterates over; payloads are never loaded to pick victims.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntrySummary {
    pub id: TrackId,
    pub size_bytes: u64,
    pub cached_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u32,
}

/// Denormalized listing data stored next to each blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadataEntry {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub duration_seconds: Option<f64>,
    pub cached_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Caller-supplied descriptive data for a blob being cached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl TrackDetails {
    /// Details with just a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Aggregate view of the blob store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached blobs
    pub count: u64,
    /// Sum of blob sizes
    pub total_bytes: u64,
    /// `cached_at` of the oldest blob
    pub oldest_cached_at: Option<DateTime<Utc>>,
}
