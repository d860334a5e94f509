//! Playback snapshot routing
//!
//! The playback engine reports a [`PlaybackSnapshot`] whenever its state
//! changes. The router fans each one out: the sync agent decides whether to
//! push the session, the prefetcher looks ahead in the queue, and a finished
//! or skipped track is recorded in the listening analytics.

use encore_cache::{AnalyticsTracker, PrefetchScheduler};
use encore_core::{PlayAnalyticsEntry, PlaybackSnapshot, TrackId};
use encore_sync::{PlaybackSyncAgent, SyncOutcome};
use std::sync::Arc;

/// Share of the track that must have played for it to count as completed
pub const COMPLETION_THRESHOLD: f64 = 0.9;

/// What one snapshot caused
#[derive(Debug, Default)]
pub struct Routed {
    pub sync: Option<SyncOutcome>,
    pub prefetch_started: Vec<TrackId>,
    /// Analytics for the track that just stopped being current
    pub recorded: Option<PlayAnalyticsEntry>,
}

pub struct SnapshotRouter {
    agent: Arc<PlaybackSyncAgent>,
    prefetcher: Arc<PrefetchScheduler>,
    analytics: AnalyticsTracker,
    previous: Option<PlaybackSnapshot>,
}

impl SnapshotRouter {
    pub fn new(
        agent: Arc<PlaybackSyncAgent>,
        prefetcher: Arc<PrefetchScheduler>,
        analytics: AnalyticsTracker,
    ) -> Self {
        Self {
            agent,
            prefetcher,
            analytics,
            previous: None,
        }
    }

    pub async fn handle(&mut self, snapshot: PlaybackSnapshot) -> Routed {
        let mut routed = Routed::default();

        let (track_changed, queue_moved) = match &self.previous {
            Some(prev) => (
                prev.track_id != snapshot.track_id,
                prev.queue != snapshot.queue
                    || prev.queue_index != snapshot.queue_index
                    || prev.shuffle_enabled != snapshot.shuffle_enabled,
            ),
            None => (true, true),
        };

        if track_changed {
            if let Some(prev) = self.previous.take() {
                routed.recorded = self.record(&prev).await;
            }
        }

        if queue_moved {
            if let Some(index) = snapshot.queue_index {
                let batch = self
                    .prefetcher
                    .schedule(&snapshot.queue, index, snapshot.shuffle_enabled)
                    .await;
                routed.prefetch_started = batch.started.iter().map(|c| c.id.clone()).collect();
            }
        }

        routed.sync = self.agent.observe(snapshot.clone()).await;
        self.previous = Some(snapshot);
        routed
    }

    /// Record the current track before shutdown
    pub async fn finish(&mut self) -> Option<PlayAnalyticsEntry> {
        let last = self.previous.take()?;
        self.record(&last).await
    }

    async fn record(&self, snapshot: &PlaybackSnapshot) -> Option<PlayAnalyticsEntry> {
        let listened = snapshot.position_seconds.max(0.0);
        match self
            .analytics
            .record_play(&snapshot.track_id, is_completed(snapshot), listened)
            .await
        {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(track_id = %snapshot.track_id, error = %e, "Failed to record play");
                None
            }
        }
    }
}

/// Whether the last known position reached the completion threshold
///
/// Tracks without a known duration count as skipped.
pub fn is_completed(snapshot: &PlaybackSnapshot) -> bool {
    match snapshot.duration_seconds {
        Some(duration) if duration > 0.0 => {
            snapshot.position_seconds >= duration * COMPLETION_THRESHOLD
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(position: f64, duration: Option<f64>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track_id: TrackId::new("a"),
            position_seconds: position,
            duration_seconds: duration,
            is_playing: true,
            volume: None,
            queue: Vec::new(),
            queue_index: None,
            shuffle_enabled: false,
        }
    }

    #[test]
    fn completion_needs_ninety_percent() {
        assert!(is_completed(&at(180.0, Some(200.0))));
        assert!(!is_completed(&at(179.9, Some(200.0))));
        assert!(!is_completed(&at(500.0, None)));
        assert!(!is_completed(&at(0.0, Some(0.0))));
    }
}
