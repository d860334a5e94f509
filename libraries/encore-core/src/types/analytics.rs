/// Listening analytics
use super::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-track play/skip history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayAnalyticsEntry {
    pub id: TrackId,
    pub play_count: u32,
    pub skip_count: u32,
    /// Fraction of plays that were not skipped, always within `[0, 1]`
    pub completion_rate: f64,
    pub listening_time_seconds: f64,
    pub last_played_at: DateTime<Utc>,
}

impl PlayAnalyticsEntry {
    /// Completion rate for the given counters
    ///
    /// `(plays - skips) / plays`, clamped to `[0, 1]`; zero plays yields `0.0`.
    #[must_use]
    pub fn completion_rate_for(play_count: u32, skip_count: u32) -> f64 {
        if play_count == 0 {
            return 0.0;
        }
        let completed = f64::from(play_count) - f64::from(skip_count);
        (completed / f64::from(play_count)).clamp(0.0, 1.0)
    }
}
