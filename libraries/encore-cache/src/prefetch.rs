//! Prefetch scheduling
//!
//! Given the playback queue and the current position, fetch upcoming tracks
//! into the blob store before they are needed. Selection is pure
//! ([`select_candidates`]); fetching happens on detached tasks bounded by a
//! semaphore, and an in-flight set prevents duplicate fetches of the same id.
//!
//! Prefetch failures never reach the caller. When the track becomes current,
//! playback streams it directly instead.

use crate::events::CacheEvent;
use crate::store::BlobStore;
use encore_core::{MediaSource, TrackId};
use encore_network::{BackoffController, NetworkMonitor};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Extra random candidates considered when shuffle is on
pub const SHUFFLE_EXTRA_CANDIDATES: usize = 2;

/// Shuffle extras are only added for queues longer than this
pub const SHUFFLE_MIN_QUEUE_LEN: usize = 5;

/// Fetch priority, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrefetchPriority {
    High,
    Normal,
    Low,
}

impl PrefetchPriority {
    /// Priority of the candidate at `position` (0-based) in selection order
    pub fn for_position(position: usize) -> Self {
        match position {
            0 => Self::High,
            1 | 2 => Self::Normal,
            _ => Self::Low,
        }
    }
}

/// A track chosen for prefetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchCandidate {
    pub id: TrackId,
    pub priority: PrefetchPriority,
}

/// Choose which tracks to prefetch, in priority order
///
/// The next `depth` tracks after `current_index` come first. With shuffle on
/// and a queue longer than five tracks, up to two more are sampled at random
/// from the rest of the queue. The current track and duplicate ids are never
/// selected.
pub fn select_candidates<R: Rng + ?Sized>(
    queue: &[TrackId],
    current_index: usize,
    shuffle_enabled: bool,
    depth: usize,
    rng: &mut R,
) -> Vec<PrefetchCandidate> {
    let current = queue.get(current_index);
    let mut seen: HashSet<&TrackId> = current.into_iter().collect();
    let mut selected: Vec<&TrackId> = Vec::new();

    for id in queue.iter().skip(current_index.saturating_add(1)) {
        if selected.len() >= depth {
            break;
        }
        if seen.insert(id) {
            selected.push(id);
        }
    }

    if shuffle_enabled && depth > 0 && queue.len() > SHUFFLE_MIN_QUEUE_LEN {
        let mut remainder: Vec<&TrackId> = Vec::new();
        for id in queue {
            if !seen.contains(id) && !remainder.contains(&id) {
                remainder.push(id);
            }
        }
        for id in remainder.choose_multiple(rng, SHUFFLE_EXTRA_CANDIDATES) {
            seen.insert(*id);
            selected.push(*id);
        }
    }

    selected
        .into_iter()
        .enumerate()
        .map(|(position, id)| PrefetchCandidate {
            id: id.clone(),
            priority: PrefetchPriority::for_position(position),
        })
        .collect()
}

/// Result of one scheduling call
///
/// Dropping it leaves the fetches running; [`PrefetchBatch::wait`] is for
/// callers that want to observe completion.
#[derive(Debug, Default)]
pub struct PrefetchBatch {
    /// Candidates a fetch was started for
    pub started: Vec<PrefetchCandidate>,
    /// Candidates skipped because they are cached or already in flight
    pub skipped: Vec<TrackId>,
    tasks: Vec<JoinHandle<()>>,
}

impl PrefetchBatch {
    /// Wait until every started fetch has finished
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Prefetch task panicked");
            }
        }
    }
}

type InFlight = Arc<Mutex<HashSet<TrackId>>>;

/// Clears an in-flight marker on drop, whatever way the fetch ended
struct InFlightGuard {
    in_flight: InFlight,
    id: TrackId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// Fetches upcoming tracks into the blob store
pub struct PrefetchScheduler {
    store: Arc<BlobStore>,
    source: Arc<dyn MediaSource>,
    network: Arc<NetworkMonitor>,
    backoff: Arc<BackoffController>,
    in_flight: InFlight,
    permits: Arc<Semaphore>,
}

impl PrefetchScheduler {
    pub fn new(
        store: Arc<BlobStore>,
        source: Arc<dyn MediaSource>,
        network: Arc<NetworkMonitor>,
        backoff: Arc<BackoffController>,
    ) -> Self {
        let concurrency = store.config().prefetch_concurrency.max(1);
        Self {
            store,
            source,
            network,
            backoff,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            permits: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Schedule prefetches using the depth recommended for current connectivity
    pub async fn schedule(
        &self,
        queue: &[TrackId],
        current_index: usize,
        shuffle_enabled: bool,
    ) -> PrefetchBatch {
        let depth = self.network.quality().prefetch_depth();
        self.schedule_with_depth(queue, current_index, shuffle_enabled, depth)
            .await
    }

    /// Schedule prefetches with an explicit depth
    pub async fn schedule_with_depth(
        &self,
        queue: &[TrackId],
        current_index: usize,
        shuffle_enabled: bool,
        depth: usize,
    ) -> PrefetchBatch {
        if depth == 0 || queue.is_empty() {
            return PrefetchBatch::default();
        }
        if !self.source.is_authenticated().await {
            tracing::debug!("Not authenticated, skipping prefetch");
            return PrefetchBatch::default();
        }
        if !self.backoff.should_attempt() {
            tracing::debug!(
                remaining_ms = self.backoff.remaining().as_millis() as u64,
                "Prefetch backing off"
            );
            return PrefetchBatch::default();
        }

        let candidates = select_candidates(
            queue,
            current_index,
            shuffle_enabled,
            depth,
            &mut rand::thread_rng(),
        );

        let mut batch = PrefetchBatch::default();
        for candidate in candidates {
            match self.claim(&candidate.id) {
                Some(guard) => {
                    tracing::debug!(
                        track_id = %candidate.id,
                        priority = ?candidate.priority,
                        "Starting prefetch"
                    );
                    batch.tasks.push(self.spawn_fetch(guard));
                    batch.started.push(candidate);
                }
                None => batch.skipped.push(candidate.id),
            }
        }
        batch
    }

    /// Ids currently being fetched
    pub fn in_flight(&self) -> Vec<TrackId> {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Mark `id` in flight unless it is cached or already being fetched
    fn claim(&self, id: &TrackId) -> Option<InFlightGuard> {
        if self.store.contains(id) {
            return None;
        }
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            id: id.clone(),
        })
    }

    fn spawn_fetch(&self, guard: InFlightGuard) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let source = Arc::clone(&self.source);
        let backoff = Arc::clone(&self.backoff);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            fetch_into_store(&store, source.as_ref(), &backoff, &guard.id).await;
            drop(guard);
        })
    }
}

async fn fetch_into_store(
    store: &BlobStore,
    source: &dyn MediaSource,
    backoff: &BackoffController,
    id: &TrackId,
) {
    let fetched = match source.resolve_stream_url(id).await {
        Ok(url) => source.fetch_audio(&url).await,
        Err(e) => Err(e),
    };

    let payload = match fetched {
        Ok(payload) => {
            backoff.record_success();
            payload
        }
        Err(e) => {
            if e.is_transient() {
                backoff.record_failure();
            }
            tracing::warn!(track_id = %id, error = %e, "Prefetch failed");
            store.emit(CacheEvent::PrefetchFailed {
                id: id.clone(),
                error: e.to_string(),
            });
            return;
        }
    };

    match store.put(id, payload, None).await {
        Ok(true) => tracing::debug!(track_id = %id, "Prefetch cached"),
        Ok(false) => {
            store.emit(CacheEvent::PrefetchFailed {
                id: id.clone(),
                error: "rejected by cache capacity".to_string(),
            });
        }
        Err(e) => {
            tracing::warn!(track_id = %id, error = %e, "Failed to store prefetched track");
            store.emit(CacheEvent::PrefetchFailed {
                id: id.clone(),
                error: e.to_string(),
            });
        }
    }
}
