//! Server reachability probe
//!
//! A desktop daemon has no browser connectivity API, so it derives
//! `is_online` and the round-trip time from a periodic TCP connect to the
//! configured server.

use encore_network::{NetworkMonitor, NetworkSignals};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Connect attempts slower than this count as offline
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// `host:port` of an http(s) URL
pub fn probe_target(server_url: &str) -> Option<String> {
    let url = url::Url::parse(server_url).ok()?;
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}

/// One connect attempt; returns the round-trip time on success
pub async fn probe_once(target: &str, timeout: Duration) -> Option<Duration> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => Some(started.elapsed()),
        Ok(Err(e)) => {
            tracing::debug!(target, error = %e, "Server probe failed");
            None
        }
        Err(_) => {
            tracing::debug!(target, "Server probe timed out");
            None
        }
    }
}

/// Fold a probe result into the monitor's signals
pub fn apply_probe(network: &NetworkMonitor, rtt: Option<Duration>) {
    let signals = match rtt {
        Some(rtt) => NetworkSignals {
            is_online: true,
            rtt_ms: Some(rtt.as_millis().min(u128::from(u32::MAX)) as u32),
            ..network.signals()
        },
        None => NetworkSignals {
            is_online: false,
            ..network.signals()
        },
    };

    let was_online = network.is_online();
    let info = network.update(signals);
    if was_online != info.is_online {
        tracing::info!(online = info.is_online, quality = info.quality.as_str(), "Connectivity changed");
    }
}

/// Probe `target` every `interval` until `shutdown` flips to `true`
pub fn spawn_probe_task(
    network: Arc<NetworkMonitor>,
    target: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rtt = probe_once(&target, PROBE_TIMEOUT.min(interval)).await;
                    apply_probe(&network, rtt);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Connectivity probe stopping");
                        break;
                    }
                }
            }
        }
    })
}
