//! Eviction policy
//!
//! Two triggers share one selection rule:
//!
//! - **Pressure**: before a write that would exceed the byte or entry budget,
//!   [`EvictionPolicy::select_for_pressure`] scans entries least recently used
//!   first and picks an entry while it is stale, while the freed bytes are
//!   still short of what the write needs, or while the entry-count quota is
//!   unmet.
//! - **Age**: [`EvictionPolicy::select_stale`] picks every entry cached longer
//!   ago than the staleness window, regardless of pressure. The store runs it
//!   on a timer (see [`spawn_cleanup_task`]).
//!
//! Selection is pure; the store applies the result and never propagates
//! eviction failures to callers.

use crate::events::EvictionReason;
use crate::store::BlobStore;
use chrono::{DateTime, Utc};
use encore_core::{CacheEntrySummary, CacheStats, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What a pressure pass must achieve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionNeed {
    /// Bytes that must be freed
    pub bytes: u64,
    /// Entries that must be removed
    pub entries: usize,
}

impl EvictionNeed {
    pub fn is_satisfied_by(&self, freed_bytes: u64, freed_entries: usize) -> bool {
        freed_bytes >= self.bytes && freed_entries >= self.entries
    }
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<TrackId>,
    pub freed_bytes: u64,
    /// Entries selected for eviction whose delete failed
    pub failed: usize,
}

/// Budgets and the selection rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_cache_bytes: u64,
    pub max_entries: usize,
    pub stale_after: chrono::Duration,
}

impl EvictionPolicy {
    pub fn new(max_cache_bytes: u64, max_entries: usize, stale_after: chrono::Duration) -> Self {
        Self {
            max_cache_bytes,
            max_entries,
            stale_after,
        }
    }

    /// Whether an entry cached at `cached_at` is stale at `now`
    pub fn is_stale(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(cached_at) > self.stale_after
    }

    /// Whether a payload of `size` bytes can ever fit
    pub fn fits_at_all(&self, size: u64) -> bool {
        size <= self.max_cache_bytes && self.max_entries > 0
    }

    /// What must be freed before writing `incoming_bytes` as a new entry
    ///
    /// Returns `None` when the write fits as is. The byte target is never
    /// smaller than the incoming payload, so an over-budget write always
    /// frees at least its own size.
    pub fn need_for(&self, stats: &CacheStats, incoming_bytes: u64) -> Option<EvictionNeed> {
        let projected_bytes = stats.total_bytes.saturating_add(incoming_bytes);
        let projected_entries = stats.count.saturating_add(1);
        let max_entries = self.max_entries as u64;

        let over_bytes = projected_bytes > self.max_cache_bytes;
        let over_entries = projected_entries > max_entries;
        if !over_bytes && !over_entries {
            return None;
        }

        let bytes = if over_bytes {
            incoming_bytes.max(projected_bytes - self.max_cache_bytes)
        } else {
            0
        };
        let entries = projected_entries.saturating_sub(max_entries) as usize;
        Some(EvictionNeed { bytes, entries })
    }

    /// Pick victims under pressure
    ///
    /// `entries` must be ordered least recently used first. Entries in
    /// `protected` are never selected.
    pub fn select_for_pressure(
        &self,
        entries: &[CacheEntrySummary],
        need: EvictionNeed,
        protected: Option<&TrackId>,
        now: DateTime<Utc>,
    ) -> Vec<(TrackId, EvictionReason)> {
        let mut freed_bytes = 0u64;
        let mut victims = Vec::new();

        for entry in entries {
            if protected == Some(&entry.id) {
                continue;
            }

            let reason = if self.is_stale(entry.cached_at, now) {
                EvictionReason::Stale
            } else if !need.is_satisfied_by(freed_bytes, victims.len()) {
                EvictionReason::Pressure
            } else {
                continue;
            };

            freed_bytes = freed_bytes.saturating_add(entry.size_bytes);
            victims.push((entry.id.clone(), reason));
        }

        victims
    }

    /// Pick every stale entry
    pub fn select_stale(&self, entries: &[CacheEntrySummary], now: DateTime<Utc>) -> Vec<TrackId> {
        entries
            .iter()
            .filter(|entry| self.is_stale(entry.cached_at, now))
            .map(|entry| entry.id.clone())
            .collect()
    }
}

/// Run the stale sweep every `interval` until `shutdown` flips to `true`
///
/// The first sweep runs one full interval after start. A failed sweep is
/// logged by the store and retried on the next tick.
pub fn spawn_cleanup_task(
    store: Arc<BlobStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = store.cleanup_stale().await;
                    if !report.evicted.is_empty() || report.failed > 0 {
                        tracing::info!(
                            evicted = report.evicted.len(),
                            freed_bytes = report.freed_bytes,
                            failed = report.failed,
                            "Stale cache sweep finished"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Cache cleanup task stopping");
                        break;
                    }
                }
            }
        }
    })
}
