use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use auto_impl::auto_impl;
use ethers_core::types::{Address, H256, U256};
use url::Url;

use crate::{ChainResult, Receipt, SignedTransfer, TransferRequest};

/// Interface to a ledger endpoint. Allows abstraction over different chains
/// and over the transport used to reach them.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait LedgerProvider: Send + Sync + Debug {
    /// Next sequence number the ledger would accept for `account`, counting
    /// operations that are still pending
    async fn get_sequence_number(&self, account: Address) -> ChainResult<u64>;

    /// Current suggested fee price
    async fn get_fee_price(&self) -> ChainResult<U256>;

    /// Current balance of `account`
    async fn get_balance(&self, account: Address) -> ChainResult<U256>;

    /// Sign and encode a transfer. Purely local, no endpoint call is made
    /// beyond what the provider has cached at construction.
    fn sign_transfer(&self, request: &TransferRequest) -> ChainResult<SignedTransfer>;

    /// Hand a signed transfer to the endpoint, returning the operation hash
    async fn submit(&self, transfer: &SignedTransfer) -> ChainResult<H256>;

    /// Look up the receipt of an operation.
    ///
    /// `Ok(None)` means the operation is not included yet.
    async fn get_receipt(&self, operation_hash: H256) -> ChainResult<Option<Receipt>>;
}

/// Opens endpoint handles. Used by workers that keep one handle each and
/// reconnect when the endpoint url they are asked to use changes.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait LedgerConnector: Send + Sync + Debug {
    /// Open a handle to the endpoint at `url`
    async fn connect(&self, url: &Url) -> ChainResult<Arc<dyn LedgerProvider>>;
}
