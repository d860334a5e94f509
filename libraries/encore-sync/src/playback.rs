//! Playback sync agent
//!
//! Pushes this device's playback state to the remote session so another
//! device can resume from it.
//!
//! ```text
//! Idle ──(playing)──► Scheduled ──(timer / track change / pause)──► Syncing
//!   ▲                                                                  │
//!   └──────────────────────────────(done)──────────────────────────────┘
//! ```
//!
//! Track changes and pause transitions sync immediately. While playing, the
//! timer fires every `base_interval * polling_multiplier(quality)` and only
//! syncs when the position moved by at least the threshold or a full
//! interval elapsed since the last sync. Offline and unauthenticated states
//! skip without counting as failures; a skip while offline is made up as
//! soon as connectivity returns.

use crate::config::{scaled, SyncConfig};
use crate::device::DeviceIdentity;
use crate::types::{SkipReason, SyncEvent, SyncOutcome, SyncPhase, SyncTrigger, EVENT_CHANNEL_CAPACITY};
use encore_core::{
    EncoreError, PlaybackSession, PlaybackSessionApi, PlaybackSnapshot, PlaybackSyncRequest,
    Result, TrackId,
};
use encore_network::{BackoffController, NetworkMonitor};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct AgentState {
    phase: SyncPhase,
    latest: Option<PlaybackSnapshot>,
    last_track: Option<TrackId>,
    was_playing: bool,
    last_synced_position: Option<f64>,
    last_synced_at: Option<Instant>,
    /// A pause that has not reached the remote yet
    pause_unsynced: bool,
    /// An attempt was skipped while offline
    resync_on_reconnect: bool,
    /// An immediate sync that arrived while a push was in flight
    pending_trigger: Option<SyncTrigger>,
}

impl AgentState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            latest: None,
            last_track: None,
            was_playing: false,
            last_synced_position: None,
            last_synced_at: None,
            pause_unsynced: false,
            resync_on_reconnect: false,
            pending_trigger: None,
        }
    }

    fn resting_phase(&self) -> SyncPhase {
        match &self.latest {
            Some(snapshot) if snapshot.is_playing => SyncPhase::Scheduled,
            _ => SyncPhase::Idle,
        }
    }
}

/// Keeps the remote playback session in step with local playback
pub struct PlaybackSyncAgent {
    api: Arc<dyn PlaybackSessionApi>,
    network: Arc<NetworkMonitor>,
    backoff: Arc<BackoffController>,
    device: DeviceIdentity,
    config: SyncConfig,
    state: Mutex<AgentState>,
    events: broadcast::Sender<SyncEvent>,
}

impl PlaybackSyncAgent {
    pub fn new(
        api: Arc<dyn PlaybackSessionApi>,
        network: Arc<NetworkMonitor>,
        backoff: Arc<BackoffController>,
        device: DeviceIdentity,
        config: SyncConfig,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            network,
            backoff,
            device,
            config,
            state: Mutex::new(AgentState::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        self.lock().phase
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn last_synced_position(&self) -> Option<f64> {
        self.lock().last_synced_position
    }

    /// Timer period for the current network quality
    pub fn effective_interval(&self) -> Duration {
        scaled(
            self.config.base_interval,
            self.network.quality().polling_multiplier(),
        )
    }

    /// Record the latest playback state
    ///
    /// Syncs immediately on a track change or a pause transition and returns
    /// the outcome; other updates wait for the timer and return `None`.
    pub async fn observe(&self, snapshot: PlaybackSnapshot) -> Option<SyncOutcome> {
        let trigger = {
            let mut state = self.lock();
            let track_changed = state.last_track.as_ref() != Some(&snapshot.track_id);
            let paused = state.was_playing && !snapshot.is_playing;

            state.last_track = Some(snapshot.track_id.clone());
            state.was_playing = snapshot.is_playing;
            if paused {
                state.pause_unsynced = true;
            }
            state.latest = Some(snapshot);
            if state.phase != SyncPhase::Syncing {
                state.phase = state.resting_phase();
            }

            if track_changed {
                Some(SyncTrigger::TrackChanged)
            } else if paused {
                Some(SyncTrigger::Paused)
            } else {
                None
            }
        };

        match trigger {
            Some(trigger) => Some(self.sync_now(trigger).await),
            None => None,
        }
    }

    /// Timer fire: sync if the position moved enough, a full interval
    /// passed, or a pause is still unsynced
    pub async fn tick(&self) -> SyncOutcome {
        let interval = self.effective_interval();
        let due = {
            let state = self.lock();
            match &state.latest {
                None => return SyncOutcome::Skipped(SkipReason::NothingToSync),
                Some(snapshot) => {
                    let moved = state.last_synced_position.map_or(true, |last| {
                        (snapshot.position_seconds - last).abs()
                            >= self.config.position_threshold.as_secs_f64()
                    });
                    let elapsed = state
                        .last_synced_at
                        .map_or(true, |at| at.elapsed() >= interval);

                    state.pause_unsynced || (snapshot.is_playing && (moved || elapsed))
                }
            }
        };

        if due {
            self.sync_now(SyncTrigger::Periodic).await
        } else {
            SyncOutcome::Skipped(SkipReason::BelowThreshold)
        }
    }

    /// React to a connectivity change
    ///
    /// Returns the outcome when a sync skipped while offline was retried.
    pub async fn on_connectivity_change(&self, is_online: bool) -> Option<SyncOutcome> {
        if !is_online {
            return None;
        }
        let pending = std::mem::take(&mut self.lock().resync_on_reconnect);
        if pending {
            tracing::debug!("Connectivity restored, syncing playback");
            Some(self.sync_now(SyncTrigger::Reconnected).await)
        } else {
            None
        }
    }

    /// Push the latest snapshot now, bypassing the delta threshold
    ///
    /// A non-periodic trigger that lands while a push is in flight is
    /// replayed by the in-flight caller once its push returns.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> SyncOutcome {
        let mut trigger = trigger;
        loop {
            let snapshot = {
                let mut state = self.lock();
                let Some(snapshot) = state.latest.clone() else {
                    return SyncOutcome::Skipped(SkipReason::NothingToSync);
                };
                if state.phase == SyncPhase::Syncing {
                    if trigger != SyncTrigger::Periodic {
                        state.pending_trigger = Some(trigger);
                    }
                    return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
                }
                if !self.network.is_online() {
                    state.resync_on_reconnect = true;
                    tracing::debug!(?trigger, "Offline, playback sync deferred");
                    return SyncOutcome::Skipped(SkipReason::Offline);
                }
                state.phase = SyncPhase::Syncing;
                snapshot
            };

            let outcome = self.push(&snapshot, trigger).await;

            let mut state = self.lock();
            if outcome.is_synced() {
                state.last_synced_position = Some(snapshot.position_seconds);
                state.last_synced_at = Some(Instant::now());
                if !snapshot.is_playing {
                    state.pause_unsynced = false;
                }
            }
            state.phase = state.resting_phase();

            match state.pending_trigger.take() {
                Some(next) => {
                    tracing::debug!(?next, "Replaying sync queued during push");
                    trigger = next;
                }
                None => return outcome,
            }
        }
    }

    async fn push(&self, snapshot: &PlaybackSnapshot, trigger: SyncTrigger) -> SyncOutcome {
        if !self.api.is_authenticated().await {
            tracing::debug!("Not authenticated, skipping playback sync");
            return SyncOutcome::Skipped(SkipReason::NotAuthenticated);
        }
        if !self.backoff.should_attempt() {
            tracing::debug!(
                remaining_ms = self.backoff.remaining().as_millis() as u64,
                "Playback sync backing off"
            );
            return SyncOutcome::Skipped(SkipReason::BackingOff);
        }

        let request = self.request_for(snapshot);
        match self.api.push_session(&request).await {
            Ok(()) => {
                self.backoff.record_success();
                tracing::debug!(
                    track_id = %snapshot.track_id,
                    position = snapshot.position_seconds,
                    ?trigger,
                    "Playback synced"
                );
                self.emit(SyncEvent::PlaybackSynced {
                    track_id: snapshot.track_id.clone(),
                    position_seconds: snapshot.position_seconds,
                    trigger,
                });
                SyncOutcome::Synced
            }
            Err(e) => {
                let retry_in = self.backoff.record_failure();
                tracing::warn!(
                    error = %e,
                    ?trigger,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Playback sync failed"
                );
                self.emit(SyncEvent::PlaybackSyncFailed {
                    trigger,
                    error: e.to_string(),
                    retry_in_ms: retry_in.as_millis() as u64,
                });
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Final best-effort push marking playback stopped
    ///
    /// Spawned and not awaited here; failures are logged and never retried.
    /// Returns `None` when there is nothing to push.
    pub fn teardown(&self) -> Option<JoinHandle<()>> {
        let mut snapshot = self.lock().latest.clone()?;
        snapshot.is_playing = false;

        let request = self.request_for(&snapshot);
        let api = Arc::clone(&self.api);
        Some(tokio::spawn(async move {
            if !api.is_authenticated().await {
                return;
            }
            match api.push_session(&request).await {
                Ok(()) => tracing::debug!("Final playback sync sent"),
                Err(e) => tracing::debug!(error = %e, "Final playback sync dropped"),
            }
        }))
    }

    /// Last session stored remotely, for resuming on this device
    pub async fn fetch_remote_session(&self) -> Result<Option<PlaybackSession>> {
        if !self.api.is_authenticated().await {
            return Err(EncoreError::NotAuthenticated);
        }
        self.api.fetch_session().await
    }

    /// Delete the remote session
    pub async fn clear_remote_session(&self) -> Result<()> {
        if !self.api.is_authenticated().await {
            return Err(EncoreError::NotAuthenticated);
        }
        self.api.clear_session().await?;
        tracing::info!("Remote playback session cleared");
        Ok(())
    }

    /// Drive the timer and connectivity reactions until `shutdown` is set
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut network = self.network.subscribe();
        let mut interval = self.effective_interval();
        let mut armed_at = Instant::now();
        let timer = tokio::time::sleep(interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => {
                    let has_snapshot = self.lock().latest.is_some();
                    if has_snapshot {
                        let outcome = self.tick().await;
                        tracing::trace!(?outcome, "Playback sync timer fired");
                    }
                    interval = self.effective_interval();
                    armed_at = Instant::now();
                    timer.as_mut().reset(armed_at + interval);
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    // Changes coalesce, so react to the latest state rather than transitions
                    let is_online = network.borrow_and_update().is_online;
                    self.on_connectivity_change(is_online).await;

                    // The deadline only moves when the quality changes the period
                    let next = self.effective_interval();
                    if next != interval {
                        interval = next;
                        timer.as_mut().reset(armed_at + interval);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Playback sync agent stopping");
                        break;
                    }
                }
            }
        }
    }

    fn request_for(&self, snapshot: &PlaybackSnapshot) -> PlaybackSyncRequest {
        PlaybackSyncRequest::from_snapshot(snapshot, &self.device.id, &self.device.name)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
