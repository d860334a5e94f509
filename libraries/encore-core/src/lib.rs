//! Encore Core
//!
//! Platform-agnostic core types, traits, and error handling for the Encore
//! offline media cache.
//!
//! This crate provides the foundational building blocks shared by the storage,
//! cache, sync and server-client crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `CachedBlobEntry`, `PlayAnalyticsEntry`, `PendingDownload`, etc.
//! - **Remote Seams**: `MediaSource`, `PlaybackSessionApi`, `DownloadApi`
//! - **Time Source**: `Clock` so staleness can be tested without waiting a week
//! - **Error Handling**: Unified `EncoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use encore_core::types::{TrackId, DownloadStatus};
//!
//! let id = TrackId::new("dQw4w9WgXcQ");
//! assert_eq!(id.as_str(), "dQw4w9WgXcQ");
//! assert_eq!(DownloadStatus::from_str("failed"), Some(DownloadStatus::Failed));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EncoreError, Result};
pub use traits::{DownloadApi, MediaSource, PlaybackSessionApi};

pub use types::{
    // Identifiers
    DownloadId, TrackId,
    // Cache
    CacheEntrySummary, CacheMetadataEntry, CacheStats, CachedBlobEntry, TrackDetails,
    // Analytics
    PlayAnalyticsEntry,
    // Downloads
    DownloadFilter, DownloadStatus, EnqueueOutcome, PendingDownload, RemoteDownload,
    SubmittedDownload,
    // Playback sync
    PlaybackSession, PlaybackSnapshot, PlaybackSyncRequest,
};
