//! Cache budgets and tuning

use std::time::Duration;

/// Limits enforced by the blob store and its eviction policy
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Upper bound on the summed payload size
    pub max_cache_bytes: u64,
    /// Upper bound on the number of cached tracks
    pub max_entries: usize,
    /// Entries cached longer ago than this are stale
    pub stale_after: Duration,
    /// Period of the background stale sweep
    pub cleanup_interval: Duration,
    /// Concurrent prefetch downloads
    pub prefetch_concurrency: usize,
}

impl CacheConfig {
    pub const DEFAULT_MAX_CACHE_BYTES: u64 = 500 * 1024 * 1024;
    pub const DEFAULT_MAX_ENTRIES: usize = 50;
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 4;

    /// Staleness window as a calendar duration
    pub fn stale_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: Self::DEFAULT_MAX_CACHE_BYTES,
            max_entries: Self::DEFAULT_MAX_ENTRIES,
            stale_after: Self::DEFAULT_STALE_AFTER,
            cleanup_interval: Self::DEFAULT_CLEANUP_INTERVAL,
            prefetch_concurrency: Self::DEFAULT_PREFETCH_CONCURRENCY,
        }
    }
}
