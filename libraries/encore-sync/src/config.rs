use std::time::Duration;

/// Timing and mode settings for the sync services
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Playback sync timer period before the network multiplier
    pub base_interval: Duration,
    /// Position change that forces a sync on the next timer fire
    pub position_threshold: Duration,
    /// Download status polling period before the network multiplier
    pub download_poll_interval: Duration,
    /// Persist every download request instead of submitting directly
    pub durable_downloads: bool,
}

impl SyncConfig {
    pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_POSITION_THRESHOLD: Duration = Duration::from_secs(3);
    pub const DEFAULT_DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_secs(30);
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_interval: Self::DEFAULT_BASE_INTERVAL,
            position_threshold: Self::DEFAULT_POSITION_THRESHOLD,
            download_poll_interval: Self::DEFAULT_DOWNLOAD_POLL_INTERVAL,
            durable_downloads: true,
        }
    }
}

/// `base` scaled by a network polling multiplier
pub(crate) fn scaled(base: Duration, multiplier: f64) -> Duration {
    base.mul_f64(multiplier.max(1.0))
}
