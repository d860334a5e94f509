//! Cache events
//!
//! Published on a broadcast channel by the blob store and the prefetch
//! scheduler. Slow subscribers may miss events (`RecvError::Lagged`); the
//! store itself stays authoritative.

use encore_core::TrackId;
use serde::{Deserialize, Serialize};

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Cached longer ago than the staleness window
    Stale,
    /// Least recently used entry removed to make room
    Pressure,
}

/// Events emitted by the cache subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A blob was written
    Stored { id: TrackId, size_bytes: u64 },

    /// A blob was removed by the eviction policy
    Evicted { id: TrackId, reason: EvictionReason },

    /// A blob was removed on request
    Removed { id: TrackId },

    /// Every blob was removed
    Cleared { count: u64 },

    /// A prefetch was rejected or failed; playback will stream instead
    PrefetchFailed { id: TrackId, error: String },
}

/// Capacity of the cache event channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;
