use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;
use ethers_core::types::H256;
use eyre::Result;

use crate::{StatusUpdate, TransactionRecord};

/// Durable storage of transaction records.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait RecordStore: Send + Sync + Debug {
    /// Persist a new record and return its assigned id
    async fn insert(&self, record: &TransactionRecord) -> Result<i64>;

    /// Apply a terminal transition to the pending record with this hash.
    ///
    /// Returns `false` without writing when no record with the hash exists
    /// or the record is already terminal.
    async fn update_status(&self, operation_hash: H256, update: &StatusUpdate) -> Result<bool>;
}
