//! Encore Cache
//!
//! Offline audio cache for the Encore client.
//!
//! This crate provides:
//! - [`BlobStore`]: durable audio payloads with an in-memory id index
//! - [`EvictionPolicy`]: byte, entry-count and age budgets (LRU + staleness)
//! - [`AnalyticsTracker`]: play/skip history and completion rates
//! - [`PrefetchScheduler`]: fetch upcoming queue entries ahead of playback
//! - [`control`]: tagged request/response protocol served by an actor
//!
//! # Architecture
//!
//! Services are plain structs shared through `Arc`; the application's
//! composition root builds one of each. Status changes are published as
//! [`CacheEvent`]s on a broadcast channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_cache::{BlobStore, CacheConfig};
//! use encore_core::{SystemClock, TrackId};
//! use std::sync::Arc;
//!
//! # async fn example(pool: sqlx::SqlitePool) -> encore_core::Result<()> {
//! let store = BlobStore::open(pool, CacheConfig::default(), Arc::new(SystemClock)).await?;
//!
//! let id = TrackId::new("dQw4w9WgXcQ");
//! if store.put(&id, vec![0u8; 1024], None).await? {
//!     assert!(store.contains(&id));
//! }
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod control;
pub mod events;
pub mod eviction;
pub mod prefetch;
pub mod store;

pub use analytics::AnalyticsTracker;
pub use config::CacheConfig;
pub use control::{CacheControl, CacheControlHandle, CacheRequest, CacheResponse};
pub use events::{CacheEvent, EvictionReason};
pub use eviction::{spawn_cleanup_task, EvictionNeed, EvictionPolicy, EvictionReport};
pub use prefetch::{
    select_candidates, PrefetchBatch, PrefetchCandidate, PrefetchPriority, PrefetchScheduler,
};
pub use store::BlobStore;
