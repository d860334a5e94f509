//! Small persistent key/value settings
//!
//! Values are stored as JSON text so callers can keep structured data
//! under a single key.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_storage::settings;
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! let device_id = settings::get_or_insert_with(pool, settings::SETTING_DEVICE_ID, || {
//!     serde_json::json!("device-123")
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Result, StorageError};
use crate::time::to_millis;

/// Stable identifier for this installation, reported with playback syncs
pub const SETTING_DEVICE_ID: &str = "sync.device_id";

/// Get a setting value
///
/// Returns `Ok(None)` if the key was never set.
pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    raw.map(|value| {
        serde_json::from_str(&value).map_err(|e| StorageError::SerializationError(e.to_string()))
    })
    .transpose()
}

/// Set a setting value, replacing any previous one
pub async fn set(pool: &SqlitePool, key: &str, value: &serde_json::Value) -> Result<()> {
    let raw =
        serde_json::to_string(value).map_err(|e| StorageError::SerializationError(e.to_string()))?;

    sqlx::query(
        "INSERT INTO app_settings (key, value, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(raw)
    .bind(to_millis(Utc::now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a setting, storing the value produced by `init` if it is missing
///
/// Concurrent callers racing on a missing key all observe the value that
/// was stored first.
pub async fn get_or_insert_with<F>(pool: &SqlitePool, key: &str, init: F) -> Result<serde_json::Value>
where
    F: FnOnce() -> serde_json::Value,
{
    if let Some(value) = get(pool, key).await? {
        return Ok(value);
    }

    let raw = serde_json::to_string(&init())
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    sqlx::query("INSERT OR IGNORE INTO app_settings (key, value, updated_at) VALUES (?, ?, ?)")
        .bind(key)
        .bind(raw)
        .bind(to_millis(Utc::now()))
        .execute(pool)
        .await?;

    get(pool, key)
        .await?
        .ok_or_else(|| StorageError::not_found("Setting", key))
}

/// Delete a setting
///
/// Returns `true` if the key existed.
pub async fn delete(pool: &SqlitePool, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM app_settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
