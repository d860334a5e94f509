//! Durable download queue storage
//!
//! Download requests made while offline (or routed through the durable queue
//! on purpose) are persisted here and re-submitted later.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_storage::pending_downloads;
//!
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! for item in pending_downloads::list_retryable(pool).await? {
//!     // Submit item.url...
//!     pending_downloads::mark_submitted(pool, &item.id, Some("srv-1"), chrono::Utc::now()).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, StorageError};
use crate::time::{from_millis, from_millis_opt, to_millis};
use chrono::{DateTime, Utc};
use encore_core::types::{DownloadId, DownloadStatus, PendingDownload};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str =
    "SELECT id, url, title, status, created_at, updated_at, attempts, error, remote_id
     FROM pending_downloads";

/// Persist a new queue entry
pub async fn insert(pool: &SqlitePool, item: &PendingDownload) -> Result<()> {
    sqlx::query(
        "INSERT INTO pending_downloads
            (id, url, title, status, created_at, updated_at, attempts, error, remote_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(item.id.as_str())
    .bind(&item.url)
    .bind(&item.title)
    .bind(item.status.as_str())
    .bind(to_millis(item.created_at))
    .bind(item.updated_at.map(to_millis))
    .bind(i64::from(item.attempts))
    .bind(&item.error)
    .bind(&item.remote_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a single entry
pub async fn get(pool: &SqlitePool, id: &DownloadId) -> Result<Option<PendingDownload>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(item_from_row).transpose()
}

/// All entries, oldest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<PendingDownload>> {
    let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, rowid ASC"))
        .fetch_all(pool)
        .await?;

    rows.iter().map(item_from_row).collect()
}

/// Entries a sync pass should (re)submit: pending or failed, oldest first
pub async fn list_retryable(pool: &SqlitePool) -> Result<Vec<PendingDownload>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE status IN ('pending', 'failed') ORDER BY created_at ASC, rowid ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

/// Entries already accepted by the server
pub async fn list_submitted(pool: &SqlitePool) -> Result<Vec<PendingDownload>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE status = 'submitted' ORDER BY created_at ASC, rowid ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

/// Record a successful submission (counts as an attempt)
pub async fn mark_submitted(
    pool: &SqlitePool,
    id: &DownloadId,
    remote_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE pending_downloads
         SET status = 'submitted', attempts = attempts + 1, error = NULL,
             remote_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(remote_id)
    .bind(to_millis(now))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("PendingDownload", id.as_str()));
    }
    Ok(())
}

/// Record a failed submission (counts as an attempt)
pub async fn mark_failed(
    pool: &SqlitePool,
    id: &DownloadId,
    error: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE pending_downloads
         SET status = 'failed', attempts = attempts + 1, error = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(error)
    .bind(to_millis(now))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("PendingDownload", id.as_str()));
    }
    Ok(())
}

/// Remove an entry
///
/// Returns `true` if an entry was removed.
pub async fn remove(pool: &SqlitePool, id: &DownloadId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM pending_downloads WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn item_from_row(row: &SqliteRow) -> Result<PendingDownload> {
    let status: String = row.try_get("status")?;
    let status = DownloadStatus::from_str(&status)
        .ok_or_else(|| StorageError::invalid_data(format!("unknown download status: {status}")))?;

    Ok(PendingDownload {
        id: DownloadId::new(row.try_get::<String, _>("id")?),
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        status,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis_opt(row.try_get("updated_at")?)?,
        attempts: row.try_get::<i64, _>("attempts")? as u32,
        error: row.try_get("error")?,
        remote_id: row.try_get("remote_id")?,
    })
}
