//! Daemon error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Encore(#[from] encore_core::EncoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Server client error: {0}")]
    ServerClient(#[from] encore_server_client::ServerClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<encore_storage::StorageError> for DaemonError {
    fn from(err: encore_storage::StorageError) -> Self {
        // StorageError -> EncoreError -> DaemonError
        DaemonError::Encore(err.into())
    }
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}
