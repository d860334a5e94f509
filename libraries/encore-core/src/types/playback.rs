/// Playback state types for cross-device resume
use super::TrackId;
use serde::{Deserialize, Serialize};

/// What the playback engine reports about the current moment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Currently loaded track
    pub track_id: TrackId,
    /// Position within the track in seconds
    pub position_seconds: f64,
    /// Track duration in seconds (if known)
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Whether audio is currently playing
    pub is_playing: bool,
    /// Volume level (0.0 - 1.0)
    #[serde(default)]
    pub volume: Option<f64>,
    /// Upcoming queue as track ids
    #[serde(default)]
    pub queue: Vec<TrackId>,
    /// Index of the current track within `queue`
    #[serde(default)]
    pub queue_index: Option<usize>,
    /// Whether the queue plays shuffled
    #[serde(default)]
    pub shuffle_enabled: bool,
}

/// Body of `POST /playback-sync`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSyncRequest {
    pub youtube_id: String,
    pub position: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_youtube_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_index: Option<usize>,
    pub device_id: String,
    pub device_name: String,
}

impl PlaybackSyncRequest {
    /// Build the wire body for a snapshot from this device
    pub fn from_snapshot(
        snapshot: &PlaybackSnapshot,
        device_id: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        let queue = if snapshot.queue.is_empty() {
            None
        } else {
            Some(
                snapshot
                    .queue
                    .iter()
                    .map(|id| id.as_str().to_string())
                    .collect(),
            )
        };

        Self {
            youtube_id: snapshot.track_id.as_str().to_string(),
            position: snapshot.position_seconds,
            duration: snapshot.duration_seconds,
            is_playing: Some(snapshot.is_playing),
            volume: snapshot.volume,
            queue_youtube_ids: queue,
            queue_index: snapshot.queue_index,
            device_id: device_id.into(),
            device_name: device_name.into(),
        }
    }
}

/// Last session stored by the server (`GET /playback-sync`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub youtube_id: String,
    pub position: f64,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub is_playing: Option<bool>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub queue_youtube_ids: Option<Vec<String>>,
    #[serde(default)]
    pub queue_index: Option<usize>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
