//! Key/value blob store
//!
//! Durable audio payloads keyed by track id, backed by `encore_storage::blobs`,
//! with an in-memory id index for synchronous existence checks on the
//! prefetch hot path.
//!
//! Writes go through a single async mutex: the capacity check, any eviction
//! it triggers and the write itself run back to back, so two concurrent puts
//! never spend the same freed budget.

use crate::config::CacheConfig;
use crate::events::{CacheEvent, EvictionReason, EVENT_CHANNEL_CAPACITY};
use crate::eviction::{EvictionPolicy, EvictionReport};
use chrono::{DateTime, Utc};
use encore_core::{
    CacheEntrySummary, CacheMetadataEntry, CacheStats, CachedBlobEntry, Clock, Result,
    TrackDetails, TrackId,
};
use encore_storage::blobs;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, Mutex};

/// Durable blob store with capacity enforcement
pub struct BlobStore {
    pool: SqlitePool,
    config: CacheConfig,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    index: RwLock<HashSet<TrackId>>,
    write_lock: Mutex<()>,
    events: broadcast::Sender<CacheEvent>,
}

impl BlobStore {
    /// Open the store and rebuild the id index from durable storage
    pub async fn open(pool: SqlitePool, config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let ids = blobs::all_ids(&pool).await?;
        tracing::debug!(entries = ids.len(), "Rebuilt cache index");

        let policy = EvictionPolicy::new(
            config.max_cache_bytes,
            config.max_entries,
            config.stale_after_chrono(),
        );
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            pool,
            config,
            policy,
            clock,
            index: RwLock::new(ids.into_iter().collect()),
            write_lock: Mutex::new(()),
            events,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Receive future cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Synchronous index lookup
    pub fn contains(&self, id: &TrackId) -> bool {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Snapshot of the indexed ids
    pub fn ids(&self) -> Vec<TrackId> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Check durable storage for `id`
    pub async fn has(&self, id: &TrackId) -> Result<bool> {
        let found = blobs::exists(&self.pool, id).await?;
        self.reconcile_index(id, found);
        Ok(found)
    }

    /// Read a blob, recording the access
    pub async fn get(&self, id: &TrackId) -> Result<Option<CachedBlobEntry>> {
        let blob = blobs::get(&self.pool, id, self.clock.now()).await?;
        self.reconcile_index(id, blob.is_some());

        if blob.is_some() {
            tracing::trace!(track_id = %id, "Cache hit");
        } else {
            tracing::trace!(track_id = %id, "Cache miss");
        }
        Ok(blob)
    }

    /// Store a payload, evicting older entries if needed
    ///
    /// Returns `false` without writing when the payload can never fit or when
    /// one eviction pass did not free enough room. Without details the title
    /// falls back to the track id.
    pub async fn put(
        &self,
        id: &TrackId,
        payload: Vec<u8>,
        details: Option<TrackDetails>,
    ) -> Result<bool> {
        let size_bytes = payload.len() as u64;
        if !self.policy.fits_at_all(size_bytes) {
            tracing::warn!(
                track_id = %id,
                size_bytes,
                max_cache_bytes = self.config.max_cache_bytes,
                "Payload exceeds the whole cache budget"
            );
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        if !self.make_room(id, size_bytes, now).await {
            tracing::warn!(track_id = %id, size_bytes, "Cache still over budget, write abandoned");
            return Ok(false);
        }

        let details = details.unwrap_or_else(|| TrackDetails::titled(id.as_str()));
        let entry = CachedBlobEntry {
            id: id.clone(),
            payload,
            size_bytes,
            cached_at: now,
            last_accessed_at: now,
            access_count: 0,
            duration_seconds: details.duration_seconds,
        };
        let metadata = CacheMetadataEntry {
            id: id.clone(),
            title: details.title,
            artist: details.artist,
            duration_seconds: details.duration_seconds,
            cached_at: now,
            size_bytes,
        };

        blobs::put(&self.pool, &entry, &metadata).await?;
        self.index_insert(id.clone());

        tracing::debug!(track_id = %id, size_bytes, "Cached blob");
        self.emit(CacheEvent::Stored {
            id: id.clone(),
            size_bytes,
        });
        Ok(true)
    }

    /// Remove a blob
    ///
    /// Returns `true` if it was cached.
    pub async fn remove(&self, id: &TrackId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let removed = blobs::delete(&self.pool, id).await?;
        self.index_remove(id);

        if removed {
            self.emit(CacheEvent::Removed { id: id.clone() });
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        Ok(blobs::stats(&self.pool).await?)
    }

    /// Cached tracks' metadata, most recently cached first
    pub async fn list_metadata(&self) -> Result<Vec<CacheMetadataEntry>> {
        Ok(blobs::list_metadata(&self.pool).await?)
    }

    /// Remove every blob
    pub async fn clear(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let count = blobs::clear(&self.pool).await?;
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        tracing::info!(count, "Cache cleared");
        self.emit(CacheEvent::Cleared { count });
        Ok(count)
    }

    /// Evict every stale entry
    ///
    /// Never fails; storage errors are logged and counted in the report.
    pub async fn cleanup_stale(&self) -> EvictionReport {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        let entries = match blobs::list_by_recency(&self.pool).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list cache entries for stale sweep");
                return EvictionReport::default();
            }
        };

        let victims = self
            .policy
            .select_stale(&entries, now)
            .into_iter()
            .map(|id| (id, EvictionReason::Stale))
            .collect();
        self.evict(&entries, victims).await
    }

    /// Single bounded eviction pass before writing `size_bytes` under `id`
    ///
    /// Returns whether the write now fits.
    async fn make_room(&self, id: &TrackId, size_bytes: u64, now: DateTime<Utc>) -> bool {
        let entries = match blobs::list_by_recency(&self.pool).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list cache entries for capacity check");
                return false;
            }
        };

        let Some(need) = self.policy.need_for(&stats_without(&entries, id), size_bytes) else {
            return true;
        };

        let victims = self.policy.select_for_pressure(&entries, need, Some(id), now);
        let report = self.evict(&entries, victims).await;
        tracing::debug!(
            track_id = %id,
            evicted = report.evicted.len(),
            freed_bytes = report.freed_bytes,
            failed = report.failed,
            "Eviction pass before write"
        );

        let remaining: Vec<CacheEntrySummary> = entries
            .into_iter()
            .filter(|entry| !report.evicted.contains(&entry.id))
            .collect();
        self.policy
            .need_for(&stats_without(&remaining, id), size_bytes)
            .is_none()
    }

    async fn evict(
        &self,
        entries: &[CacheEntrySummary],
        victims: Vec<(TrackId, EvictionReason)>,
    ) -> EvictionReport {
        let sizes: HashMap<&TrackId, u64> = entries.iter().map(|e| (&e.id, e.size_bytes)).collect();
        let mut report = EvictionReport::default();

        for (id, reason) in victims {
            match blobs::delete(&self.pool, &id).await {
                Ok(_) => {
                    self.index_remove(&id);
                    report.freed_bytes += sizes.get(&id).copied().unwrap_or(0);
                    tracing::debug!(track_id = %id, ?reason, "Evicted cache entry");
                    self.emit(CacheEvent::Evicted {
                        id: id.clone(),
                        reason,
                    });
                    report.evicted.push(id);
                }
                Err(e) => {
                    tracing::warn!(track_id = %id, error = %e, "Failed to evict cache entry");
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn reconcile_index(&self, id: &TrackId, present: bool) {
        if present {
            self.index_insert(id.clone());
        } else {
            self.index_remove(id);
        }
    }

    fn index_insert(&self, id: TrackId) {
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
    }

    fn index_remove(&self, id: &TrackId) {
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Stats over `entries`, ignoring any existing entry for `id` (it is about
/// to be replaced)
fn stats_without(entries: &[CacheEntrySummary], id: &TrackId) -> CacheStats {
    entries
        .iter()
        .filter(|entry| &entry.id != id)
        .fold(CacheStats::default(), |mut stats, entry| {
            stats.count += 1;
            stats.total_bytes += entry.size_bytes;
            stats.oldest_cached_at = Some(match stats.oldest_cached_at {
                Some(oldest) => oldest.min(entry.cached_at),
                None => entry.cached_at,
            });
            stats
        })
}
