use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{BatchId, SubmissionOutcome, TransferRequest};

/// Lifecycle of a persisted transfer.
///
/// `Pending` may move to `Success` or `Failed` exactly once, both terminal
/// states are final.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Submitted and waiting for a receipt
    Pending,
    /// Included and executed successfully
    Success,
    /// Rejected at submission, reverted, or never confirmed
    Failed,
}

impl TransactionStatus {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// One submitted (or rejected) transfer as it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Store-assigned row id, `None` until inserted
    pub id: Option<i64>,
    /// Episode this record belongs to
    pub batch_id: BatchId,
    /// Sending account
    pub account_address: Address,
    /// Operation hash, absent when submission failed
    pub operation_hash: Option<H256>,
    /// Sequence number the transfer was signed with
    pub sequence_number: u64,
    /// Recipient
    pub destination: Address,
    /// Amount transferred
    pub value: U256,
    /// Fee price the transfer was signed with
    pub fee_price: U256,
    /// Fee limit the transfer was signed with
    pub fee_limit: u64,
    /// Current status
    pub status: TransactionStatus,
    /// When the transfer was handed to the endpoint
    pub submitted_at: DateTime<Utc>,
    /// When a terminal status was observed
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Submit latency while pending, end-to-end latency once confirmed
    pub latency_ms: f64,
    /// Failure description
    pub error: Option<String>,
}

impl TransactionRecord {
    /// Build the record persisted right after a submission attempt
    pub fn from_submission(
        batch_id: BatchId,
        request: &TransferRequest,
        outcome: &SubmissionOutcome,
    ) -> Self {
        Self {
            id: None,
            batch_id,
            account_address: request.account.address(),
            operation_hash: outcome.operation_hash,
            sequence_number: outcome.sequence_number,
            destination: request.destination,
            value: request.value,
            fee_price: request.fee_price,
            fee_limit: request.fee_limit,
            status: outcome.status,
            submitted_at: outcome.submitted_at,
            confirmed_at: None,
            latency_ms: outcome.latency_ms,
            error: outcome.error.clone(),
        }
    }
}
