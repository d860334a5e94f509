//! Encore Storage
//!
//! `SQLite` persistence layer for the Encore offline media cache.
//!
//! Everything that must survive a process restart lives here: cached audio
//! payloads with their listing metadata, listening analytics, the durable
//! download queue, and small settings such as the device identifier.
//!
//! # Architecture
//!
//! - **Vertical Slicing**: Each feature owns its own queries (`blobs`, `analytics`, ...)
//! - **Atomic Entries**: Blob + metadata writes share one transaction
//! - **Millisecond Timestamps**: All times are stored as unix epoch milliseconds
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_storage::{blobs, create_pool, run_migrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://encore.db").await?;
//! run_migrations(&pool).await?;
//!
//! let stats = blobs::stats(&pool).await?;
//! println!("{} cached tracks, {} bytes", stats.count, stats.total_bytes);
//! # Ok(())
//! # }
//! ```

mod error;
mod time;

// Vertical slices
pub mod analytics;
pub mod blobs;
pub mod pending_downloads;
pub mod settings;

pub use error::StorageError;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// This should be called once when the application starts to ensure
/// the database schema is up to date.
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://encore.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!(url = %database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::debug!("SQLite pool ready");

    Ok(pool)
}
