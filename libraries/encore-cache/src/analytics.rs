//! Listening analytics
//!
//! Per-track play, skip and listen-time counters. The derived completion rate
//! marks tracks the listener reliably finishes; [`AnalyticsTracker::frequently_played`]
//! exposes them as a prefetch/retention signal.

use encore_core::{Clock, PlayAnalyticsEntry, Result, TrackId};
use encore_storage::analytics;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Records plays and answers "what does this listener finish"
#[derive(Clone)]
pub struct AnalyticsTracker {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AnalyticsTracker {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Record one play; `completed = false` counts it as a skip
    pub async fn record_play(
        &self,
        id: &TrackId,
        completed: bool,
        listened_seconds: f64,
    ) -> Result<PlayAnalyticsEntry> {
        let entry =
            analytics::record_play(&self.pool, id, completed, listened_seconds, self.clock.now())
                .await?;

        tracing::debug!(
            track_id = %id,
            completed,
            play_count = entry.play_count,
            completion_rate = entry.completion_rate,
            "Recorded play"
        );
        Ok(entry)
    }

    pub async fn get(&self, id: &TrackId) -> Result<Option<PlayAnalyticsEntry>> {
        Ok(analytics::get(&self.pool, id).await?)
    }

    /// Up to `limit` most played tracks with completion rate above 0.5
    pub async fn frequently_played(&self, limit: u32) -> Result<Vec<TrackId>> {
        Ok(analytics::frequently_played(&self.pool, limit).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<PlayAnalyticsEntry>> {
        Ok(analytics::list_all(&self.pool).await?)
    }
}
