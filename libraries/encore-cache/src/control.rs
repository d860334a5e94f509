//! Cache-control message protocol
//!
//! UI-adjacent callers talk to the cache through tagged JSON messages such as
//! `{"type": "is_cached", "ids": ["abc"]}`. Messages are validated when they
//! are parsed; malformed input is rejected instead of being treated as an
//! empty request.
//!
//! Requests are served by a [`CacheControl`] actor task. The
//! [`CacheControlHandle`] applies a timeout to every request and answers with
//! [`CacheResponse::fallback_for`] when the actor is slow or gone, so callers
//! never stall on the cache.

use crate::prefetch::PrefetchScheduler;
use crate::store::BlobStore;
use encore_core::{CacheMetadataEntry, CacheStats, EncoreError, Result, TrackId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Default bound on how long a caller waits for the actor
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Requests understood by the cache actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheRequest {
    /// Count, total size and oldest entry
    Stats,

    /// Which of `ids` are cached
    IsCached { ids: Vec<TrackId> },

    /// Metadata of every cached track
    ListCached,

    /// Schedule prefetches for a queue position
    Prefetch {
        queue: Vec<TrackId>,
        current_index: usize,
        #[serde(default)]
        shuffle: bool,
    },

    /// Remove one cached track
    Remove { id: TrackId },

    /// Remove every cached track
    Clear,
}

impl CacheRequest {
    /// Parse and validate a JSON message
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EncoreError::invalid_message(e.to_string()))
    }
}

/// Responses from the cache actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheResponse {
    Stats { stats: CacheStats },
    Cached { ids: Vec<TrackId> },
    Listing { entries: Vec<CacheMetadataEntry> },
    PrefetchScheduled { started: Vec<TrackId> },
    Removed { removed: bool },
    Cleared { count: u64 },
    Error { message: String },
}

impl CacheResponse {
    /// Empty, success-shaped answer for `request`
    pub fn fallback_for(request: &CacheRequest) -> Self {
        match request {
            CacheRequest::Stats => Self::Stats {
                stats: CacheStats::default(),
            },
            CacheRequest::IsCached { .. } => Self::Cached { ids: Vec::new() },
            CacheRequest::ListCached => Self::Listing {
                entries: Vec::new(),
            },
            CacheRequest::Prefetch { .. } => Self::PrefetchScheduled {
                started: Vec::new(),
            },
            CacheRequest::Remove { .. } => Self::Removed { removed: false },
            CacheRequest::Clear => Self::Cleared { count: 0 },
        }
    }
}

type Envelope = (CacheRequest, oneshot::Sender<CacheResponse>);

/// Actor owning the cache services
pub struct CacheControl {
    store: Arc<BlobStore>,
    prefetcher: Arc<PrefetchScheduler>,
}

impl CacheControl {
    /// Start the actor; it stops once every handle is dropped
    pub fn spawn(
        store: Arc<BlobStore>,
        prefetcher: Arc<PrefetchScheduler>,
    ) -> (CacheControlHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let actor = Self { store, prefetcher };
        let handle = tokio::spawn(actor.run(rx));

        (
            CacheControlHandle {
                tx,
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            handle,
        )
    }

    async fn run(self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some((request, reply)) = rx.recv().await {
            let response = self.handle(request).await;
            // The caller may have timed out already
            let _ = reply.send(response);
        }
        tracing::debug!("Cache control actor stopped");
    }

    async fn handle(&self, request: CacheRequest) -> CacheResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Cache control request failed");
                CacheResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, request: CacheRequest) -> Result<CacheResponse> {
        Ok(match request {
            CacheRequest::Stats => CacheResponse::Stats {
                stats: self.store.stats().await?,
            },
            CacheRequest::IsCached { ids } => CacheResponse::Cached {
                ids: ids.into_iter().filter(|id| self.store.contains(id)).collect(),
            },
            CacheRequest::ListCached => CacheResponse::Listing {
                entries: self.store.list_metadata().await?,
            },
            CacheRequest::Prefetch {
                queue,
                current_index,
                shuffle,
            } => {
                let batch = self.prefetcher.schedule(&queue, current_index, shuffle).await;
                CacheResponse::PrefetchScheduled {
                    started: batch.started.iter().map(|c| c.id.clone()).collect(),
                }
            }
            CacheRequest::Remove { id } => CacheResponse::Removed {
                removed: self.store.remove(&id).await?,
            },
            CacheRequest::Clear => CacheResponse::Cleared {
                count: self.store.clear().await?,
            },
        })
    }
}

/// Cloneable sender side of the cache actor
#[derive(Debug, Clone)]
pub struct CacheControlHandle {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl CacheControlHandle {
    /// Same handle with a different request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request, falling back to an empty answer on timeout or shutdown
    pub async fn request(&self, request: CacheRequest) -> CacheResponse {
        let fallback = CacheResponse::fallback_for(&request);
        let (reply_tx, reply_rx) = oneshot::channel();

        let exchange = async {
            self.tx.send((request, reply_tx)).await.ok()?;
            reply_rx.await.ok()
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::debug!("Cache control actor unavailable, using fallback");
                fallback
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Cache control request timed out, using fallback"
                );
                fallback
            }
        }
    }

    /// Parse a JSON message and send it
    ///
    /// Malformed messages fail with [`EncoreError::InvalidMessage`].
    pub async fn request_json(&self, json: &str) -> Result<CacheResponse> {
        let request = CacheRequest::parse(json)?;
        Ok(self.request(request).await)
    }
}
