use chrono::{DateTime, Utc};
use ethers_core::types::H256;

use crate::TransactionStatus;

/// Result of one submission attempt.
///
/// A rejected submission is still an outcome: it has no hash, a `Failed`
/// status and the endpoint's error text.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// Hash returned by the endpoint on acceptance
    pub operation_hash: Option<H256>,
    /// Sequence number the transfer was signed with
    pub sequence_number: u64,
    /// `Pending` when accepted, `Failed` otherwise
    pub status: TransactionStatus,
    /// Wall-clock time right before the transfer was sent
    pub submitted_at: DateTime<Utc>,
    /// Time spent in the send call only, excluding signing
    pub latency_ms: f64,
    /// Endpoint or signing error
    pub error: Option<String>,
}

impl SubmissionOutcome {
    /// An accepted submission
    pub fn accepted(
        operation_hash: H256,
        sequence_number: u64,
        submitted_at: DateTime<Utc>,
        latency_ms: f64,
    ) -> Self {
        Self {
            operation_hash: Some(operation_hash),
            sequence_number,
            status: TransactionStatus::Pending,
            submitted_at,
            latency_ms,
            error: None,
        }
    }

    /// A rejected submission, no hash is recorded
    pub fn rejected(
        sequence_number: u64,
        submitted_at: DateTime<Utc>,
        latency_ms: f64,
        error: impl ToString,
    ) -> Self {
        Self {
            operation_hash: None,
            sequence_number,
            status: TransactionStatus::Failed,
            submitted_at,
            latency_ms,
            error: Some(error.to_string()),
        }
    }

    /// Whether the endpoint accepted the transfer
    pub fn is_accepted(&self) -> bool {
        self.operation_hash.is_some()
    }
}

/// Why a confirmation did not end in success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmationError {
    /// No receipt within the timeout and no query error was observed
    #[error("timeout waiting for transaction receipt")]
    Timeout,
    /// No receipt within the timeout, the last receipt query failed
    #[error("receipt query failed: {0}")]
    Endpoint(String),
    /// A receipt was found but execution failed
    #[error("transaction reverted")]
    Reverted,
}

/// Terminal result of waiting for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptOutcome {
    /// `Success` or `Failed`
    pub status: TransactionStatus,
    /// When the terminal state was observed
    pub confirmed_at: DateTime<Utc>,
    /// Measured from the submission start
    pub latency_ms: f64,
    /// Set whenever `status` is `Failed`
    pub error: Option<ConfirmationError>,
}

impl ReceiptOutcome {
    /// Receipt found with a success flag
    pub fn success(confirmed_at: DateTime<Utc>, latency_ms: f64) -> Self {
        Self {
            status: TransactionStatus::Success,
            confirmed_at,
            latency_ms,
            error: None,
        }
    }

    /// Reverted, timed out, or the endpoint kept failing
    pub fn failure(confirmed_at: DateTime<Utc>, latency_ms: f64, error: ConfirmationError) -> Self {
        Self {
            status: TransactionStatus::Failed,
            confirmed_at,
            latency_ms,
            error: Some(error),
        }
    }

    /// The update applied to the stored record
    pub fn into_update(self) -> StatusUpdate {
        StatusUpdate {
            status: self.status,
            confirmed_at: self.confirmed_at,
            latency_ms: self.latency_ms,
            error: self.error.map(|e| e.to_string()),
        }
    }
}

/// Terminal transition written to a pending record.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// New, terminal status
    pub status: TransactionStatus,
    /// When the terminal state was observed
    pub confirmed_at: DateTime<Utc>,
    /// End-to-end latency
    pub latency_ms: f64,
    /// Failure description
    pub error: Option<String>,
}
