//! Listening analytics storage
//!
//! One row per track that has ever been played. Rows are small and are not
//! subject to cache capacity limits.

use crate::error::Result;
use crate::time::{from_millis, to_millis};
use chrono::{DateTime, Utc};
use encore_core::types::{PlayAnalyticsEntry, TrackId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Record one play (or skip) of a track
///
/// Creates the row on first play. Counters are updated and the completion
/// rate recomputed inside one transaction.
pub async fn record_play(
    pool: &SqlitePool,
    id: &TrackId,
    completed: bool,
    listened_seconds: f64,
    now: DateTime<Utc>,
) -> Result<PlayAnalyticsEntry> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query(
        "SELECT id, play_count, skip_count, completion_rate, listening_time_seconds, last_played_at
         FROM play_analytics WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let (play_count, skip_count, listening_time) = match existing {
        Some(row) => {
            let entry = entry_from_row(&row)?;
            (
                entry.play_count,
                entry.skip_count,
                entry.listening_time_seconds,
            )
        }
        None => (0, 0, 0.0),
    };

    let play_count = play_count.saturating_add(1);
    let skip_count = if completed {
        skip_count
    } else {
        skip_count.saturating_add(1)
    };
    let entry = PlayAnalyticsEntry {
        id: id.clone(),
        play_count,
        skip_count,
        completion_rate: PlayAnalyticsEntry::completion_rate_for(play_count, skip_count),
        listening_time_seconds: listening_time + listened_seconds.max(0.0),
        last_played_at: now,
    };

    sqlx::query(
        "INSERT INTO play_analytics
            (id, play_count, skip_count, completion_rate, listening_time_seconds, last_played_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            play_count = excluded.play_count,
            skip_count = excluded.skip_count,
            completion_rate = excluded.completion_rate,
            listening_time_seconds = excluded.listening_time_seconds,
            last_played_at = excluded.last_played_at",
    )
    .bind(entry.id.as_str())
    .bind(i64::from(entry.play_count))
    .bind(i64::from(entry.skip_count))
    .bind(entry.completion_rate)
    .bind(entry.listening_time_seconds)
    .bind(to_millis(entry.last_played_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(entry)
}

/// Get analytics for a single track
pub async fn get(pool: &SqlitePool, id: &TrackId) -> Result<Option<PlayAnalyticsEntry>> {
    let row = sqlx::query(
        "SELECT id, play_count, skip_count, completion_rate, listening_time_seconds, last_played_at
         FROM play_analytics WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Most played tracks that listeners usually finish
///
/// Ordered by play count (descending), restricted to completion rate above 0.5.
pub async fn frequently_played(pool: &SqlitePool, limit: u32) -> Result<Vec<TrackId>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM play_analytics
         WHERE completion_rate > 0.5
         ORDER BY play_count DESC, last_played_at DESC, id ASC
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(TrackId::new).collect())
}

/// All analytics rows, most played first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<PlayAnalyticsEntry>> {
    let rows = sqlx::query(
        "SELECT id, play_count, skip_count, completion_rate, listening_time_seconds, last_played_at
         FROM play_analytics
         ORDER BY play_count DESC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

fn entry_from_row(row: &SqliteRow) -> Result<PlayAnalyticsEntry> {
    Ok(PlayAnalyticsEntry {
        id: TrackId::new(row.try_get::<String, _>("id")?),
        play_count: row.try_get::<i64, _>("play_count")? as u32,
        skip_count: row.try_get::<i64, _>("skip_count")? as u32,
        completion_rate: row.try_get("completion_rate")?,
        listening_time_seconds: row.try_get("listening_time_seconds")?,
        last_played_at: from_millis(row.try_get("last_played_at")?)?,
    })
}
