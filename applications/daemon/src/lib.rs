//! Encore daemon library
//!
//! Configuration, service wiring and the snapshot router behind the
//! `encore-daemon` binary. Exposed as a library so integration tests can
//! compose the same services the binary runs.

pub mod config;
pub mod error;
pub mod probe;
pub mod services;
pub mod session;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use services::Services;
pub use session::{Routed, SnapshotRouter};
