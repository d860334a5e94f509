//! Playback sync agent behavior on a paused clock


use encore_core::TrackId;
use encore_network::NetworkSignals;
use encore_sync::{SkipReason, SyncEvent, SyncOutcome, SyncPhase, SyncTrigger};
use std::time::Duration;
use test_helpers::*;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn test_track_change_syncs_immediately() {
    let h = agent_harness();

    let outcome = h.agent.observe(snapshot("A", 0.0, true)).await;

    assert_eq!(outcome, Some(SyncOutcome::Synced));
    let push = h.api.last_push().unwrap();
    assert_eq!(push.youtube_id, "A");
    assert_eq!(push.device_id, "device-1");
    assert_eq!(push.device_name, "Encore on Linux");
    assert_eq!(push.is_playing, Some(true));
    assert_eq!(h.agent.phase(), SyncPhase::Scheduled);

    // Next track bypasses every threshold
    let outcome = h.agent.observe(snapshot("B", 0.0, true)).await;
    assert_eq!(outcome, Some(SyncOutcome::Synced));
    assert_eq!(h.api.pushes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timer_syncs_after_interval_or_position_delta() {
    let h = agent_harness();
    h.agent.observe(snapshot("A", 0.0, true)).await;

    // Small move, interval not elapsed
    assert_eq!(h.agent.observe(snapshot("A", 1.0, true)).await, None);
    assert_eq!(
        h.agent.tick().await,
        SyncOutcome::Skipped(SkipReason::BelowThreshold)
    );

    // Default network is Good: 10 s * 1.5
    assert_eq!(h.agent.effective_interval(), Duration::from_secs(15));
    tokio::time::advance(Duration::from_secs(15)).await;
    assert_eq!(h.agent.tick().await, SyncOutcome::Synced);
    assert_eq!(h.agent.last_synced_position(), Some(1.0));

    // Three seconds of movement is enough without waiting
    h.agent.observe(snapshot("A", 4.0, true)).await;
    assert_eq!(h.agent.tick().await, SyncOutcome::Synced);
    assert_eq!(h.api.pushes().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_syncs_immediately() {
    let h = agent_harness();
    h.agent.observe(snapshot("A", 0.0, true)).await;

    let outcome = h.agent.observe(snapshot("A", 1.5, false)).await;

    assert_eq!(outcome, Some(SyncOutcome::Synced));
    let push = h.api.last_push().unwrap();
    assert_eq!(push.is_playing, Some(false));
    assert_eq!(push.position, 1.5);
    assert_eq!(h.agent.phase(), SyncPhase::Idle);

    // Paused and synced: the timer has nothing to do
    assert_eq!(
        h.agent.tick().await,
        SyncOutcome::Skipped(SkipReason::BelowThreshold)
    );
}

#[tokio::test(start_paused = true)]
async fn test_offline_defers_until_connectivity_returns() {
    let h = agent_harness();
    h.network.set_online(false);

    let outcome = h.agent.observe(snapshot("A", 0.0, true)).await;
    assert_eq!(outcome, Some(SyncOutcome::Skipped(SkipReason::Offline)));
    assert!(h.api.pushes().is_empty());
    assert_eq!(h.backoff.failure_count(), 0);

    let mut events = h.agent.subscribe();
    h.network.set_online(true);
    let outcome = h.agent.on_connectivity_change(true).await;

    assert_eq!(outcome, Some(SyncOutcome::Synced));
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::PlaybackSynced {
            track_id: TrackId::new("A"),
            position_seconds: 0.0,
            trigger: SyncTrigger::Reconnected,
        }
    );

    // Nothing left to make up
    assert_eq!(h.agent.on_connectivity_change(true).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_failures_back_off_and_success_resets() {
    let h = agent_harness();
    h.api.set_failing(true);

    let outcome = h.agent.observe(snapshot("A", 0.0, true)).await;
    assert!(matches!(outcome, Some(SyncOutcome::Failed(_))));
    assert_eq!(h.backoff.failure_count(), 1);

    h.api.set_failing(false);
    let outcome = h.agent.observe(snapshot("B", 0.0, true)).await;
    assert_eq!(outcome, Some(SyncOutcome::Skipped(SkipReason::BackingOff)));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(h.agent.sync_now(SyncTrigger::Manual).await, SyncOutcome::Synced);
    assert_eq!(h.backoff.failure_count(), 0);
    assert_eq!(h.api.last_push().unwrap().youtube_id, "B");
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_skips_without_failure() {
    let h = agent_harness();
    h.api.set_authenticated(false);

    let outcome = h.agent.observe(snapshot("A", 0.0, true)).await;

    assert_eq!(
        outcome,
        Some(SyncOutcome::Skipped(SkipReason::NotAuthenticated))
    );
    assert!(h.api.pushes().is_empty());
    assert_eq!(h.backoff.failure_count(), 0);
    assert!(h.agent.fetch_remote_session().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_sends_stopped_state() {
    let h = agent_harness();
    assert!(h.agent.teardown().is_none());

    h.agent.observe(snapshot("A", 30.0, true)).await;
    let handle = h.agent.teardown().unwrap();
    handle.await.unwrap();

    let push = h.api.last_push().unwrap();
    assert_eq!(push.is_playing, Some(false));
    assert_eq!(push.position, 30.0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_failure_is_swallowed() {
    let h = agent_harness();
    h.agent.observe(snapshot("A", 30.0, true)).await;
    h.api.set_failing(true);

    let handle = h.agent.teardown().unwrap();
    assert!(handle.await.is_ok());
    assert_eq!(h.api.pushes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_session_round_trip() {
    let h = agent_harness();
    assert_eq!(h.agent.fetch_remote_session().await.unwrap(), None);

    h.agent.observe(snapshot("A", 12.0, true)).await;
    let session = h.agent.fetch_remote_session().await.unwrap().unwrap();
    assert_eq!(session.youtube_id, "A");
    assert_eq!(session.device_id.as_deref(), Some("device-1"));

    h.agent.clear_remote_session().await.unwrap();
    assert_eq!(h.agent.fetch_remote_session().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_fires_timer_and_stops() {
    let h = agent_harness();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(h.agent.clone().run(shutdown_rx));

    h.agent.observe(snapshot("A", 0.0, true)).await;
    h.agent.observe(snapshot("A", 5.0, true)).await;
    assert_eq!(h.api.pushes().len(), 1);

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(h.api.pushes().len(), 2);
    assert_eq!(h.api.last_push().unwrap().position, 5.0);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_resyncs_on_reconnect() {
    let h = agent_harness();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(h.agent.clone().run(shutdown_rx));
    tokio::task::yield_now().await;

    h.network.set_online(false);
    h.agent.observe(snapshot("A", 0.0, false)).await;
    assert!(h.api.pushes().is_empty());

    h.network.set_online(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.api.pushes().len(), 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_timer_survives_network_updates() {
    let h = agent_harness();
    h.agent.observe(snapshot("A", 0.0, true)).await;
    h.agent.observe(snapshot("A", 100.0, true)).await;
    assert_eq!(h.api.pushes().len(), 1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(h.agent.clone().run(shutdown_rx));

    // Quality stays Good while the round-trip time keeps moving
    for step in 0..12u32 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        h.network.update(NetworkSignals {
            rtt_ms: Some(50 + step),
            ..h.network.signals()
        });
    }

    let pushes = h.api.pushes().len();
    assert!(pushes >= 5, "only {pushes} pushes after two minutes of playback");
    assert_eq!(h.api.pushes()[1].position, 100.0);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_track_change_during_push_is_replayed() {
    let h = agent_harness();
    h.agent.observe(snapshot("A", 0.0, true)).await;
    h.agent.observe(snapshot("A", 5.0, true)).await;

    h.api.set_push_delay(Duration::from_secs(1));
    let agent = h.agent.clone();
    let in_flight = tokio::spawn(async move { agent.tick().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.agent.phase(), SyncPhase::Syncing);

    let outcome = h.agent.observe(snapshot("B", 0.0, true)).await;
    assert_eq!(
        outcome,
        Some(SyncOutcome::Skipped(SkipReason::AlreadySyncing))
    );

    in_flight.await.unwrap();
    let pushes = h.api.pushes();
    assert_eq!(pushes.len(), 3);
    assert_eq!(pushes[1].youtube_id, "A");
    assert_eq!(pushes[2].youtube_id, "B");
    assert_eq!(h.agent.phase(), SyncPhase::Scheduled);
}
