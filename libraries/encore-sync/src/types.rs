use encore_core::{DownloadId, TrackId};
use serde::{Deserialize, Serialize};

/// Playback sync agent phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Not playing, nothing scheduled
    Idle,
    /// Playing, waiting for the next timer fire
    Scheduled,
    /// A push is in progress
    Syncing,
}

/// What caused a playback sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    TrackChanged,
    Paused,
    Periodic,
    Reconnected,
    Manual,
}

/// Why an attempt did not reach the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NothingToSync,
    Offline,
    NotAuthenticated,
    BackingOff,
    AlreadySyncing,
    BelowThreshold,
}

/// Result of one playback sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Skipped(SkipReason),
    Failed(String),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Result of one durable download sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSyncSummary {
    pub submitted: usize,
    pub failed: usize,
    /// Set when the pass did not run at all
    pub skipped: Option<SkipReason>,
}

/// Status updates published by the sync services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    PlaybackSynced {
        track_id: TrackId,
        position_seconds: f64,
        trigger: SyncTrigger,
    },
    PlaybackSyncFailed {
        trigger: SyncTrigger,
        error: String,
        retry_in_ms: u64,
    },
    DownloadQueued {
        id: DownloadId,
        url: String,
    },
    DownloadSubmitted {
        id: DownloadId,
        remote_id: String,
    },
    DownloadFailed {
        id: DownloadId,
        error: String,
    },
    DownloadCompleted {
        id: DownloadId,
    },
}

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 128;
