//! Surge. Throughput testing for account-based ledgers.
//!
//! This crate contains the primitives, traits, and types shared by the
//! submission engine, the storage layer and the chain integrations.

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::panic)]

pub use error::*;
pub use traits::*;
pub use types::*;

mod error;
/// Async traits implemented by ledger endpoints and record stores
pub mod traits;
/// Value types flowing between the engine components
pub mod types;

/// Re-exported primitive types so downstream crates agree on them
pub use ethers_core::types::{Address, Bytes, H256, U256};
