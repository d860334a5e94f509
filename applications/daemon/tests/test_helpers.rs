//! Test helpers for daemon integration tests
//!
//! Services are composed exactly as the binary composes them, against a
//! temp-file database and a wiremock server standing in for the remote.

#![allow(dead_code)]

use encore_core::{PlaybackSnapshot, TrackId};
use encore_daemon::{DaemonConfig, Services};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "daemon-token";

/// Temp directory holding the daemon database
pub struct TestEnv {
    pub config: DaemonConfig,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub fn new(server_url: &str) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("encore.db");

        let mut config = DaemonConfig::default();
        config.server.url = server_url.to_string();
        config.server.access_token = Some(TOKEN.to_string());
        config.storage.database_url = format!("sqlite://{}", db_path.display());

        Self {
            config,
            _temp_dir: temp_dir,
        }
    }

    pub async fn open(&self) -> Services {
        Services::open(&self.config)
            .await
            .expect("Failed to open services")
    }
}

/// Mock server answering stream-url, audio and playback-sync requests
pub async fn mock_remote(tracks: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    for track in tracks {
        Mock::given(method("GET"))
            .and(path(format!("/audio/{track}/player")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "stream_url": format!("/stream/{track}") })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/stream/{track}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("audio-{track}").into_bytes()))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/playback-sync"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

pub fn snapshot(track: &str, position: f64, queue: &[&str], index: usize) -> PlaybackSnapshot {
    PlaybackSnapshot {
        track_id: TrackId::new(track),
        position_seconds: position,
        duration_seconds: Some(200.0),
        is_playing: true,
        volume: Some(0.8),
        queue: queue.iter().map(|id| TrackId::new(*id)).collect(),
        queue_index: Some(index),
        shuffle_enabled: false,
    }
}

/// Wait until `id` shows up in the cache index
pub async fn wait_until_cached(services: &Services, id: &str) -> bool {
    let id = TrackId::new(id);
    for _ in 0..100 {
        if services.store.contains(&id) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
