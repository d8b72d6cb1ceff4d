use std::sync::Arc;

use ethers_core::types::{Address, Bytes, H256, U256};

use crate::Account;

/// Gas limit of a plain value transfer.
pub const TRANSFER_FEE_LIMIT: u64 = 21_000;

/// One unsigned transfer in an account's burst.
///
/// Created right before signing and discarded after submission, only its
/// outcome is persisted.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Account paying for and signing the transfer
    pub account: Arc<Account>,
    /// Recipient
    pub destination: Address,
    /// Amount transferred, in the smallest unit
    pub value: U256,
    /// Per-account sequence number (nonce) assigned by the submission engine
    pub sequence_number: u64,
    /// Fee price quote shared by the whole burst
    pub fee_price: U256,
    /// Fee limit (gas limit)
    pub fee_limit: u64,
}

/// A transfer signed and encoded, ready to be handed to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// Hash identifying the operation on the ledger
    pub hash: H256,
    /// Signed, encoded payload
    pub raw: Bytes,
    /// Sequence number the payload was signed with
    pub sequence_number: u64,
}

/// A receipt for an operation that made it into a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Operation the receipt belongs to
    pub operation_hash: H256,
    /// Block the operation was included in, if reported
    pub block_number: Option<u64>,
    /// `false` means the operation was mined but reverted
    pub succeeded: bool,
}
