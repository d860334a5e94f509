//! Cached audio blob storage
//!
//! Each cached track is a `cached_blobs` row (payload + recency bookkeeping)
//! paired with a `cache_metadata` row used for listings. Both rows are written
//! and deleted inside a single transaction so a crash mid-write never leaves a
//! half-cached track behind.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_storage::blobs;
//! use encore_core::TrackId;
//!
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! let now = chrono::Utc::now();
//! if let Some(blob) = blobs::get(pool, &TrackId::new("abc"), now).await? {
//!     println!("{} bytes, read {} times", blob.size_bytes, blob.access_count);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::time::{from_millis, from_millis_opt, to_millis};
use chrono::{DateTime, Utc};
use encore_core::types::{
    CacheEntrySummary, CacheMetadataEntry, CacheStats, CachedBlobEntry, TrackId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Insert or replace a blob together with its metadata
pub async fn put(
    pool: &SqlitePool,
    entry: &CachedBlobEntry,
    metadata: &CacheMetadataEntry,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO cached_blobs
            (id, payload, size_bytes, cached_at, last_accessed_at, access_count, duration_seconds)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            payload = excluded.payload,
            size_bytes = excluded.size_bytes,
            cached_at = excluded.cached_at,
            last_accessed_at = excluded.last_accessed_at,
            access_count = excluded.access_count,
            duration_seconds = excluded.duration_seconds",
    )
    .bind(entry.id.as_str())
    .bind(entry.payload.as_slice())
    .bind(entry.size_bytes as i64)
    .bind(to_millis(entry.cached_at))
    .bind(to_millis(entry.last_accessed_at))
    .bind(i64::from(entry.access_count))
    .bind(entry.duration_seconds)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO cache_metadata (id, title, artist, duration_seconds, cached_at, size_bytes)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            duration_seconds = excluded.duration_seconds,
            cached_at = excluded.cached_at,
            size_bytes = excluded.size_bytes",
    )
    .bind(metadata.id.as_str())
    .bind(&metadata.title)
    .bind(&metadata.artist)
    .bind(metadata.duration_seconds)
    .bind(to_millis(metadata.cached_at))
    .bind(metadata.size_bytes as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Read a blob and record the access
///
/// The recency update and the read happen in one transaction; the returned
/// entry already reflects the new `last_accessed_at` and `access_count`.
pub async fn get(
    pool: &SqlitePool,
    id: &TrackId,
    now: DateTime<Utc>,
) -> Result<Option<CachedBlobEntry>> {
    let mut tx = pool.begin().await?;

    let touched = sqlx::query(
        "UPDATE cached_blobs
         SET last_accessed_at = ?, access_count = access_count + 1
         WHERE id = ?",
    )
    .bind(to_millis(now))
    .bind(id.as_str())
    .execute(&mut *tx)
    .await?;

    if touched.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let row = sqlx::query(
        "SELECT id, payload, size_bytes, cached_at, last_accessed_at, access_count, duration_seconds
         FROM cached_blobs WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(CachedBlobEntry {
        id: TrackId::new(row.try_get::<String, _>("id")?),
        payload: row.try_get("payload")?,
        size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
        cached_at: from_millis(row.try_get("cached_at")?)?,
        last_accessed_at: from_millis(row.try_get("last_accessed_at")?)?,
        access_count: row.try_get::<i64, _>("access_count")? as u32,
        duration_seconds: row.try_get("duration_seconds")?,
    }))
}

/// Check whether a blob exists without loading it
pub async fn exists(pool: &SqlitePool, id: &TrackId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM cached_blobs WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

/// Delete a blob and its metadata
///
/// Returns `true` if a blob was removed.
pub async fn delete(pool: &SqlitePool, id: &TrackId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cache_metadata WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM cached_blobs WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// List every blob's bookkeeping, least recently used first
pub async fn list_by_recency(pool: &SqlitePool) -> Result<Vec<CacheEntrySummary>> {
    let rows = sqlx::query(
        "SELECT id, size_bytes, cached_at, last_accessed_at, access_count
         FROM cached_blobs
         ORDER BY last_accessed_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// All cached ids (used to rebuild the in-memory index)
pub async fn all_ids(pool: &SqlitePool) -> Result<Vec<TrackId>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM cached_blobs")
        .fetch_all(pool)
        .await?;

    Ok(ids.into_iter().map(TrackId::new).collect())
}

/// List cached tracks' metadata, most recently cached first
pub async fn list_metadata(pool: &SqlitePool) -> Result<Vec<CacheMetadataEntry>> {
    let rows = sqlx::query(
        "SELECT id, title, artist, duration_seconds, cached_at, size_bytes
         FROM cache_metadata
         ORDER BY cached_at DESC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CacheMetadataEntry {
                id: TrackId::new(row.try_get::<String, _>("id")?),
                title: row.try_get("title")?,
                artist: row.try_get("artist")?,
                duration_seconds: row.try_get("duration_seconds")?,
                cached_at: from_millis(row.try_get("cached_at")?)?,
                size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
            })
        })
        .collect()
}

/// Count, total size and oldest entry
pub async fn stats(pool: &SqlitePool) -> Result<CacheStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count,
                COALESCE(SUM(size_bytes), 0) AS total_bytes,
                MIN(cached_at) AS oldest
         FROM cached_blobs",
    )
    .fetch_one(pool)
    .await?;

    Ok(CacheStats {
        count: row.try_get::<i64, _>("count")? as u64,
        total_bytes: row.try_get::<i64, _>("total_bytes")? as u64,
        oldest_cached_at: from_millis_opt(row.try_get("oldest")?)?,
    })
}

/// Remove every blob and its metadata
///
/// Returns the number of blobs removed.
pub async fn clear(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cache_metadata")
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM cached_blobs")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

fn summary_from_row(row: &SqliteRow) -> Result<CacheEntrySummary> {
    Ok(CacheEntrySummary {
        id: TrackId::new(row.try_get::<String, _>("id")?),
        size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
        cached_at: from_millis(row.try_get("cached_at")?)?,
        last_accessed_at: from_millis(row.try_get("last_accessed_at")?)?,
        access_count: row.try_get::<i64, _>("access_count")? as u32,
    })
}
