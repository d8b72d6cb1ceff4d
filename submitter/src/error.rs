use surge_core::{Address, ChainCommunicationError};

/// Errors that abort the submission loop of a single account.
///
/// Per-request failures are never surfaced through this type, they become
/// `failed` records.
#[derive(Debug, thiserror::Error)]
pub enum SubmitterError {
    /// The starting sequence number could not be fetched
    #[error("failed to fetch sequence number of {account:?}: {source}")]
    SequenceFetch {
        /// Account whose burst was being prepared
        account: Address,
        /// Endpoint error
        #[source]
        source: ChainCommunicationError,
    },
    /// The shared fee price quote could not be fetched
    #[error("failed to fetch fee price: {0}")]
    FeePriceFetch(#[source] ChainCommunicationError),
    /// `start + count` does not fit a sequence number
    #[error("sequence numbers starting at {start} cannot hold {count} transfers")]
    SequenceOverflow {
        /// First sequence number of the burst
        start: u64,
        /// Requested burst size
        count: usize,
    },
    /// The record sink stopped accepting records
    #[error("record sink closed")]
    SinkClosed,
}

impl SubmitterError {
    /// Short label used in metrics
    pub fn to_metrics_label(&self) -> &'static str {
        match self {
            SubmitterError::SequenceFetch { .. } => "sequence_fetch",
            SubmitterError::FeePriceFetch(_) => "fee_price_fetch",
            SubmitterError::SequenceOverflow { .. } => "sequence_overflow",
            SubmitterError::SinkClosed => "sink_closed",
        }
    }
}
