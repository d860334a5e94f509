//! Durable download queue
//!
//! User-initiated download requests are written to the `pending_downloads`
//! table so they survive restarts and offline periods. A sync pass submits
//! every pending or failed entry on its own: one entry failing never rolls
//! back the others. Submitted entries stay in the table until the server's
//! in-progress listing stops reporting them.

use crate::config::{scaled, SyncConfig};
use crate::types::{DownloadSyncSummary, SkipReason, SyncEvent, EVENT_CHANNEL_CAPACITY};
use encore_core::{
    Clock, DownloadApi, DownloadFilter, DownloadId, DownloadStatus, EncoreError, EnqueueOutcome,
    PendingDownload, Result,
};
use encore_network::{BackoffController, NetworkMonitor};
use encore_storage::pending_downloads;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;

/// Restart-surviving queue of download requests
pub struct DurableDownloadQueue {
    pool: SqlitePool,
    api: Arc<dyn DownloadApi>,
    network: Arc<NetworkMonitor>,
    backoff: Arc<BackoffController>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    sync_lock: Mutex<()>,
    /// A pass was skipped while offline
    deferred: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl DurableDownloadQueue {
    pub fn new(
        pool: SqlitePool,
        api: Arc<dyn DownloadApi>,
        network: Arc<NetworkMonitor>,
        backoff: Arc<BackoffController>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pool,
            api,
            network,
            backoff,
            clock,
            config,
            sync_lock: Mutex::new(()),
            deferred: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Ask for a download
    ///
    /// Submits directly when online and durable queueing is disabled; a
    /// failed direct submission falls back to the durable queue. Otherwise
    /// the request is persisted for the next sync pass.
    pub async fn enqueue(&self, url: &str, title: Option<String>) -> Result<EnqueueOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(EncoreError::invalid_input("download URL is empty"));
        }

        if self.network.is_online() && !self.config.durable_downloads {
            match self.api.submit_downloads(&[url.to_string()], true).await {
                Ok(submitted) if !submitted.is_empty() => {
                    self.backoff.record_success();
                    tracing::info!(url, remote_id = %submitted[0].id, "Download submitted");
                    return Ok(EnqueueOutcome {
                        success: true,
                        id: Some(submitted[0].id.clone()),
                    });
                }
                Ok(_) => {
                    tracing::warn!(url, "Server accepted no downloads, queueing instead");
                }
                Err(e) => {
                    if e.is_transient() {
                        self.backoff.record_failure();
                    }
                    tracing::warn!(url, error = %e, "Direct download submission failed, queueing instead");
                }
            }
        }

        let item = PendingDownload {
            id: DownloadId::generate(),
            url: url.to_string(),
            title,
            status: DownloadStatus::Pending,
            created_at: self.clock.now(),
            updated_at: None,
            attempts: 0,
            error: None,
            remote_id: None,
        };

        if let Err(e) = pending_downloads::insert(&self.pool, &item).await {
            tracing::error!(url, error = %e, "Failed to persist download request");
            return Ok(EnqueueOutcome {
                success: false,
                id: None,
            });
        }

        tracing::info!(id = %item.id, url, "Download queued");
        self.emit(SyncEvent::DownloadQueued {
            id: item.id.clone(),
            url: item.url,
        });
        Ok(EnqueueOutcome {
            success: true,
            id: Some(item.id.to_string()),
        })
    }

    /// Every queued entry, oldest first
    pub async fn list_pending(&self) -> Result<Vec<PendingDownload>> {
        Ok(pending_downloads::list(&self.pool).await?)
    }

    /// Drop a queued entry
    pub async fn remove(&self, id: &DownloadId) -> Result<bool> {
        Ok(pending_downloads::remove(&self.pool, id).await?)
    }

    /// Submit every pending or failed entry
    ///
    /// Skipped entirely while offline, while the downloads category is
    /// backing off, or while another pass is running.
    pub async fn trigger_sync(&self) -> Result<DownloadSyncSummary> {
        let Ok(_guard) = self.sync_lock.try_lock() else {
            return Ok(skipped(SkipReason::AlreadySyncing));
        };
        if !self.network.is_online() {
            self.deferred.store(true, Ordering::SeqCst);
            tracing::debug!("Offline, download sync deferred");
            return Ok(skipped(SkipReason::Offline));
        }
        if !self.backoff.should_attempt() {
            tracing::debug!(
                remaining_ms = self.backoff.remaining().as_millis() as u64,
                "Download sync backing off"
            );
            return Ok(skipped(SkipReason::BackingOff));
        }

        let items = pending_downloads::list_retryable(&self.pool).await?;
        let mut summary = DownloadSyncSummary::default();

        for item in items {
            if self.submit_one(&item).await {
                summary.submitted += 1;
            } else {
                summary.failed += 1;
            }
        }

        if summary.submitted + summary.failed > 0 {
            tracing::info!(
                submitted = summary.submitted,
                failed = summary.failed,
                "Download sync finished"
            );
        }
        Ok(summary)
    }

    /// Submit one entry and record the result; returns whether it was accepted
    async fn submit_one(&self, item: &PendingDownload) -> bool {
        let now = self.clock.now();
        let result = match self.api.submit_downloads(&[item.url.clone()], true).await {
            Ok(submitted) => submitted
                .into_iter()
                .next()
                .ok_or_else(|| EncoreError::invalid_message("server accepted no downloads")),
            Err(e) => Err(e),
        };

        match result {
            Ok(remote) => {
                self.backoff.record_success();
                if let Err(e) =
                    pending_downloads::mark_submitted(&self.pool, &item.id, Some(&remote.id), now).await
                {
                    tracing::warn!(id = %item.id, error = %e, "Failed to record submitted download");
                }
                tracing::debug!(id = %item.id, remote_id = %remote.id, "Download submitted");
                self.emit(SyncEvent::DownloadSubmitted {
                    id: item.id.clone(),
                    remote_id: remote.id,
                });
                true
            }
            Err(e) => {
                if e.is_transient() {
                    self.backoff.record_failure();
                }
                let error = e.to_string();
                if let Err(e) = pending_downloads::mark_failed(&self.pool, &item.id, &error, now).await {
                    tracing::warn!(id = %item.id, error = %e, "Failed to record download failure");
                }
                tracing::warn!(id = %item.id, url = %item.url, error = %error, "Download submission failed");
                self.emit(SyncEvent::DownloadFailed {
                    id: item.id.clone(),
                    error,
                });
                false
            }
        }
    }

    /// Drop submitted entries the server no longer reports as in progress
    ///
    /// Returns how many entries completed.
    pub async fn poll_remote_status(&self) -> Result<usize> {
        if !self.network.is_online() {
            return Ok(0);
        }
        let submitted = pending_downloads::list_submitted(&self.pool).await?;
        if submitted.is_empty() {
            return Ok(0);
        }

        let mut in_progress = HashSet::new();
        for filter in [DownloadFilter::Pending, DownloadFilter::Downloading] {
            for remote in self.api.list_downloads(filter).await? {
                in_progress.insert(remote.id);
            }
        }

        let mut completed = 0;
        for item in submitted {
            let Some(remote_id) = &item.remote_id else {
                continue;
            };
            if in_progress.contains(remote_id) {
                continue;
            }
            if pending_downloads::remove(&self.pool, &item.id).await? {
                completed += 1;
                tracing::info!(id = %item.id, remote_id = %remote_id, "Download completed");
                self.emit(SyncEvent::DownloadCompleted { id: item.id });
            }
        }
        Ok(completed)
    }

    /// Sync on start, whenever connectivity returns, and on every poll tick
    /// until `shutdown` is set
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut network = self.network.subscribe();
        let mut was_online = network.borrow().is_online;
        self.sync_and_poll().await;

        let mut interval = self.poll_interval();
        let mut armed_at = Instant::now();
        let timer = tokio::time::sleep(interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => {
                    self.sync_and_poll().await;
                    interval = self.poll_interval();
                    armed_at = Instant::now();
                    timer.as_mut().reset(armed_at + interval);
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let is_online = network.borrow_and_update().is_online;
                    // Changes coalesce, so an offline skip also counts as a transition
                    if is_online && (!was_online || self.deferred.swap(false, Ordering::SeqCst)) {
                        tracing::debug!("Connectivity restored, syncing downloads");
                        self.sync_and_poll().await;
                    }
                    was_online = is_online;

                    let next = self.poll_interval();
                    if next != interval {
                        interval = next;
                        timer.as_mut().reset(armed_at + interval);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Download queue runner stopping");
                        break;
                    }
                }
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        scaled(
            self.config.download_poll_interval,
            self.network.quality().polling_multiplier(),
        )
    }

    async fn sync_and_poll(&self) {
        if let Err(e) = self.trigger_sync().await {
            tracing::warn!(error = %e, "Download sync failed");
        }
        if let Err(e) = self.poll_remote_status().await {
            tracing::debug!(error = %e, "Download status poll failed");
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

fn skipped(reason: SkipReason) -> DownloadSyncSummary {
    DownloadSyncSummary {
        skipped: Some(reason),
        ..DownloadSyncSummary::default()
    }
}
