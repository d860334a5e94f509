//! Encore Server Client
//!
//! HTTP client library for the Encore media server API.
//!
//! # Features
//!
//! - **Audio**: resolve a track's stream URL and fetch its bytes
//! - **Downloads**: submit server-side downloads and poll their status
//! - **Playback sync**: push, fetch and clear the "resume playback" session
//!
//! Every request carries `Authorization: Bearer <token>`. The client
//! implements the [`encore_core::MediaSource`], [`encore_core::PlaybackSessionApi`]
//! and [`encore_core::DownloadApi`] seams, converting its errors into
//! [`encore_core::EncoreError`] so callers can tell transient failures from
//! permanent ones.
//!
//! # Example
//!
//! ```ignore
//! use encore_server_client::{EncoreServerClient, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_token("https://music.example.com", "token");
//!     let client = EncoreServerClient::new(config)?;
//!
//!     let handle = client.authorized().await?;
//!     if let Some(session) = handle.playback().fetch().await? {
//!         println!("Resume {} at {}s", session.youtube_id, session.position);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod audio;
mod client;
mod download;
mod error;
mod playback;
mod remote;
mod types;

// Re-export main types
pub use client::{user_agent, AuthorizedHandle, EncoreServerClient};
pub use error::{Result, ServerClientError};
pub use types::{ServerConfig, StreamUrlResponse};

// Re-export sub-clients for direct use if needed
pub use audio::AudioClient;
pub use download::DownloadClient;
pub use playback::PlaybackClient;
