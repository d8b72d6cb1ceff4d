//! Ethereum-family ledger integration: an ethers-backed endpoint provider,
//! the new-block push feed and HD account derivation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used, clippy::panic)]

pub use self::{block_feed::*, ledger::*, wallet::*};

mod block_feed;
mod error;
mod ledger;
mod wallet;
