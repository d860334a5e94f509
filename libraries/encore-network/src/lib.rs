//! Encore Network
//!
//! Connectivity awareness and retry pacing shared by every component that
//! talks to the remote.
//!
//! - [`network`]: classify raw connectivity signals into a [`NetworkQuality`]
//!   and derive prefetch depth, polling cadence and batch size from it
//! - [`backoff`]: per-category exponential backoff with jitter
//!
//! # Example
//!
//! ```rust
//! use encore_network::{classify, EffectiveType, NetworkQuality, NetworkSignals};
//!
//! let info = classify(&NetworkSignals {
//!     effective_type: EffectiveType::ThreeG,
//!     ..NetworkSignals::default()
//! });
//! assert_eq!(info.quality, NetworkQuality::Moderate);
//! assert_eq!(info.quality.prefetch_depth(), 1);
//! ```

pub mod backoff;
pub mod network;

pub use backoff::{BackoffCategory, BackoffConfig, BackoffController, BackoffRegistry};
pub use network::{
    classify, polling_multiplier, recommended_batch_size, recommended_prefetch_depth,
    EffectiveType, NetworkInfo, NetworkMonitor, NetworkQuality, NetworkSignals,
};
