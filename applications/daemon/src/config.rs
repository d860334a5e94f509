//! Daemon configuration
use crate::error::{DaemonError, Result};
use encore_cache::CacheConfig;
use encore_network::{EffectiveType, NetworkSignals};
use encore_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "encore.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_server")]
    pub server: ServerSettings,

    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default = "default_cache")]
    pub cache: CacheSettings,

    #[serde(default = "default_sync")]
    pub sync: SyncSettings,

    #[serde(default = "default_network")]
    pub network: NetworkSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,

    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncSettings {
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,

    #[serde(default = "default_position_threshold_secs")]
    pub position_threshold_secs: f64,

    #[serde(default = "default_durable_downloads")]
    pub durable_downloads: bool,

    #[serde(default = "default_download_poll_secs")]
    pub download_poll_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NetworkSettings {
    /// `slow-2g`, `2g`, `3g` or `4g`
    #[serde(default = "default_effective_type")]
    pub effective_type: String,

    #[serde(default)]
    pub downlink_mbps: Option<f64>,

    #[serde(default)]
    pub rtt_ms: Option<u32>,

    #[serde(default)]
    pub save_data: bool,

    #[serde(default)]
    pub is_cellular: bool,

    /// Seconds between reachability probes of the server
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `encore.toml` is read when
    /// present. `ENCORE_`-prefixed variables override both, with `__`
    /// between section and key (`ENCORE_SERVER__ACCESS_TOKEN`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, environment())
    }

    pub(crate) fn load_from(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) if !path.exists() => {
                return Err(DaemonError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(environment);

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let server_url = url::Url::parse(&self.server.url)
            .map_err(|e| DaemonError::Config(format!("Invalid server URL: {e}")))?;
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(DaemonError::Config(format!(
                "Server URL must be http or https, got {}",
                server_url.scheme()
            )));
        }

        if !self.storage.database_url.starts_with("sqlite:") {
            return Err(DaemonError::Config(format!(
                "Database URL must be a sqlite: URL, got {}",
                self.storage.database_url
            )));
        }

        let budgets = [
            ("cache.max_cache_bytes", self.cache.max_cache_bytes),
            ("cache.max_entries", self.cache.max_entries as u64),
            ("cache.stale_after_secs", self.cache.stale_after_secs),
            ("cache.cleanup_interval_secs", self.cache.cleanup_interval_secs),
            ("cache.prefetch_concurrency", self.cache.prefetch_concurrency as u64),
            ("sync.base_interval_secs", self.sync.base_interval_secs),
            ("sync.download_poll_secs", self.sync.download_poll_secs),
            ("network.probe_interval_secs", self.network.probe_interval_secs),
        ];
        if let Some((name, _)) = budgets.iter().find(|(_, value)| *value == 0) {
            return Err(DaemonError::Config(format!("{name} must be greater than zero")));
        }

        if !self.sync.position_threshold_secs.is_finite() || self.sync.position_threshold_secs < 0.0 {
            return Err(DaemonError::Config(
                "sync.position_threshold_secs must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_cache_bytes: self.cache.max_cache_bytes,
            max_entries: self.cache.max_entries,
            stale_after: Duration::from_secs(self.cache.stale_after_secs),
            cleanup_interval: Duration::from_secs(self.cache.cleanup_interval_secs),
            prefetch_concurrency: self.cache.prefetch_concurrency,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            base_interval: Duration::from_secs(self.sync.base_interval_secs),
            position_threshold: Duration::from_secs_f64(self.sync.position_threshold_secs),
            download_poll_interval: Duration::from_secs(self.sync.download_poll_secs),
            durable_downloads: self.sync.durable_downloads,
        }
    }

    /// Initial connectivity signals; the probe refines `is_online` and rtt
    pub fn network_signals(&self) -> NetworkSignals {
        NetworkSignals {
            is_online: true,
            effective_type: EffectiveType::parse(&self.network.effective_type),
            downlink_mbps: self.network.downlink_mbps,
            rtt_ms: self.network.rtt_ms,
            save_data: self.network.save_data,
            is_cellular: self.network.is_cellular,
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.network.probe_interval_secs)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("ENCORE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// Default values
fn default_server() -> ServerSettings {
    ServerSettings {
        url: default_server_url(),
        access_token: None,
    }
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_storage() -> StorageSettings {
    StorageSettings {
        database_url: default_database_url(),
    }
}

fn default_database_url() -> String {
    "sqlite://./data/encore.db".to_string()
}

fn default_cache() -> CacheSettings {
    CacheSettings {
        max_cache_bytes: default_max_cache_bytes(),
        max_entries: default_max_entries(),
        stale_after_secs: default_stale_after_secs(),
        cleanup_interval_secs: default_cleanup_interval_secs(),
        prefetch_concurrency: default_prefetch_concurrency(),
    }
}

fn default_max_cache_bytes() -> u64 {
    CacheConfig::DEFAULT_MAX_CACHE_BYTES
}

fn default_max_entries() -> usize {
    CacheConfig::DEFAULT_MAX_ENTRIES
}

fn default_stale_after_secs() -> u64 {
    CacheConfig::DEFAULT_STALE_AFTER.as_secs()
}

fn default_cleanup_interval_secs() -> u64 {
    CacheConfig::DEFAULT_CLEANUP_INTERVAL.as_secs()
}

fn default_prefetch_concurrency() -> usize {
    CacheConfig::DEFAULT_PREFETCH_CONCURRENCY
}

fn default_sync() -> SyncSettings {
    SyncSettings {
        base_interval_secs: default_base_interval_secs(),
        position_threshold_secs: default_position_threshold_secs(),
        durable_downloads: default_durable_downloads(),
        download_poll_secs: default_download_poll_secs(),
    }
}

fn default_base_interval_secs() -> u64 {
    SyncConfig::DEFAULT_BASE_INTERVAL.as_secs()
}

fn default_position_threshold_secs() -> f64 {
    SyncConfig::DEFAULT_POSITION_THRESHOLD.as_secs_f64()
}

fn default_durable_downloads() -> bool {
    true
}

fn default_download_poll_secs() -> u64 {
    SyncConfig::DEFAULT_DOWNLOAD_POLL_INTERVAL.as_secs()
}

fn default_network() -> NetworkSettings {
    NetworkSettings {
        effective_type: default_effective_type(),
        downlink_mbps: None,
        rtt_ms: None,
        save_data: false,
        is_cellular: false,
        probe_interval_secs: default_probe_interval_secs(),
    }
}

fn default_effective_type() -> String {
    "4g".to_string()
}

fn default_probe_interval_secs() -> u64 {
    15
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            cache: default_cache(),
            sync: default_sync(),
            network: default_network(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        environment().source(Some(source))
    }

    #[test]
    fn defaults_match_library_constants() {
        let config = DaemonConfig::default();
        assert_eq!(config.cache_config(), CacheConfig::default());
        assert_eq!(config.sync_config(), SyncConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encore.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[cache]\nmax_entries = 10\n\n[server]\nurl = \"https://music.example.com\"").unwrap();

        let config = DaemonConfig::load_from(Some(&path), env(&[])).unwrap();
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.max_cache_bytes, CacheConfig::DEFAULT_MAX_CACHE_BYTES);
        assert_eq!(config.server.url, "https://music.example.com");
        assert_eq!(config.sync, default_sync());
    }

    #[test]
    fn environment_overrides_file() {
        let config = DaemonConfig::load_from(
            None,
            env(&[
                ("ENCORE_SERVER__ACCESS_TOKEN", "secret"),
                ("ENCORE_SYNC__DURABLE_DOWNLOADS", "false"),
                ("ENCORE_CACHE__MAX_ENTRIES", "12"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.access_token.as_deref(), Some("secret"));
        assert!(!config.sync.durable_downloads);
        assert_eq!(config.cache.max_entries, 12);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = DaemonConfig::load_from(Some(Path::new("/nonexistent/encore.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }

    #[test]
    fn validate_rejects_zero_budgets() {
        let mut config = DaemonConfig::default();
        config.cache.max_entries = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cache.max_entries"), "{err}");
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut config = DaemonConfig::default();
        config.server.url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.server.url = "ftp://music.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.storage.database_url = "postgres://localhost/encore".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn network_signals_parse_effective_type() {
        let mut config = DaemonConfig::default();
        config.network.effective_type = "3g".to_string();
        config.network.rtt_ms = Some(300);

        let signals = config.network_signals();
        assert_eq!(signals.effective_type, EffectiveType::ThreeG);
        assert_eq!(signals.rtt_ms, Some(300));
        assert!(signals.is_online);
    }
}
