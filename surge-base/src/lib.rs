//! Shared plumbing for surge agents: settings, tracing, metrics and the
//! transaction record store.

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::panic)]

pub use db::*;
pub use metrics::*;
pub use server::*;

/// Transaction record storage backed by SQLite
pub mod db;
/// Prometheus metrics shared by every agent
pub mod metrics;
/// Settings loading and tracing configuration
pub mod settings;

mod server;
