//! Encore sync
//!
//! Keeps remote state in step with this device under unreliable
//! connectivity:
//!
//! - [`PlaybackSyncAgent`] pushes the playback position to the remote
//!   "resume playback" session, throttled by position delta and elapsed time
//!   and gated by the playback-sync backoff category.
//! - [`DurableDownloadQueue`] persists user-initiated download requests and
//!   submits them once connectivity allows, one entry at a time.
//! - [`DeviceIdentity`] names this device in pushed sessions.
//!
//! Both services publish [`SyncEvent`]s and expose a `run` loop that stops
//! when its shutdown `watch` flips to `true`.

mod config;
mod device;
mod downloads;
mod playback;
mod types;

pub use config::SyncConfig;
pub use device::{device_id, device_name_from_user_agent, DeviceIdentity};
pub use downloads::DurableDownloadQueue;
pub use playback::PlaybackSyncAgent;
pub use types::{DownloadSyncSummary, SkipReason, SyncEvent, SyncOutcome, SyncPhase, SyncTrigger};
