//! Composition root
//!
//! Every long-lived service is constructed here exactly once and shared by
//! `Arc`; nothing in the libraries reaches for a global.
use crate::config::DaemonConfig;
use crate::error::Result;
use encore_cache::{AnalyticsTracker, BlobStore, PrefetchScheduler};
use encore_core::{Clock, DownloadApi, MediaSource, PlaybackSessionApi, SystemClock};
use encore_network::{BackoffCategory, BackoffRegistry, NetworkMonitor};
use encore_server_client::{user_agent, EncoreServerClient, ServerConfig};
use encore_sync::{DeviceIdentity, DurableDownloadQueue, PlaybackSyncAgent};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

pub struct Services {
    pub config: DaemonConfig,
    pub pool: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub network: Arc<NetworkMonitor>,
    pub backoff: BackoffRegistry,
    pub client: Arc<EncoreServerClient>,
    pub store: Arc<BlobStore>,
    pub analytics: AnalyticsTracker,
    pub prefetcher: Arc<PrefetchScheduler>,
    pub playback: Arc<PlaybackSyncAgent>,
    pub downloads: Arc<DurableDownloadQueue>,
}

impl Services {
    /// Open the database and wire every service against it
    pub async fn open(config: &DaemonConfig) -> Result<Self> {
        ensure_database_dir(&config.storage.database_url).await?;

        let pool = encore_storage::create_pool(&config.storage.database_url).await?;
        encore_storage::run_migrations(&pool).await?;
        tracing::info!(url = %config.storage.database_url, "Database ready");

        let client = Arc::new(EncoreServerClient::new(ServerConfig {
            url: config.server.url.clone(),
            access_token: config.server.access_token.clone(),
        })?);

        Self::with_client(config, pool, client).await
    }

    /// Wire services around an existing pool and server client
    pub async fn with_client(
        config: &DaemonConfig,
        pool: SqlitePool,
        client: Arc<EncoreServerClient>,
    ) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let network = Arc::new(NetworkMonitor::new(config.network_signals()));
        let backoff = BackoffRegistry::new();

        let store = Arc::new(BlobStore::open(pool.clone(), config.cache_config(), Arc::clone(&clock)).await?);
        tracing::info!(
            max_cache_bytes = config.cache.max_cache_bytes,
            max_entries = config.cache.max_entries,
            "Cache store opened"
        );

        let analytics = AnalyticsTracker::new(pool.clone(), Arc::clone(&clock));

        let media: Arc<dyn MediaSource> = client.clone();
        let prefetcher = Arc::new(PrefetchScheduler::new(
            Arc::clone(&store),
            media,
            Arc::clone(&network),
            backoff.get(BackoffCategory::Prefetch),
        ));

        let device = DeviceIdentity::load(&pool, &user_agent()).await?;
        tracing::info!(device_id = %device.id, device_name = %device.name, "Device identity loaded");

        let sessions: Arc<dyn PlaybackSessionApi> = client.clone();
        let playback = Arc::new(PlaybackSyncAgent::new(
            sessions,
            Arc::clone(&network),
            backoff.get(BackoffCategory::PlaybackSync),
            device,
            config.sync_config(),
        ));

        let download_api: Arc<dyn DownloadApi> = client.clone();
        let downloads = Arc::new(DurableDownloadQueue::new(
            pool.clone(),
            download_api,
            Arc::clone(&network),
            backoff.get(BackoffCategory::Downloads),
            Arc::clone(&clock),
            config.sync_config(),
        ));

        Ok(Self {
            config: config.clone(),
            pool,
            clock,
            network,
            backoff,
            client,
            store,
            analytics,
            prefetcher,
            playback,
            downloads,
        })
    }
}

/// Create the parent directory of a file-backed SQLite URL
async fn ensure_database_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("encore.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        ensure_database_dir(&url).await.unwrap();
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn memory_urls_need_no_directory() {
        ensure_database_dir("sqlite::memory:").await.unwrap();
    }
}
