//! Concurrent submission and asynchronous confirmation of transfer bursts.
//!
//! An episode derives nothing and owns no keys: it is handed accounts, an
//! endpoint and a record store, submits `count` transfers per account and
//! hands every accepted transfer to a fixed pool of confirmation workers.

#![deny(clippy::unwrap_used, clippy::panic)]

pub use confirmation::{ConfirmationEngine, RECEIPT_POLL_INTERVAL};
pub use error::SubmitterError;
pub use metrics::SubmitterMetrics;
pub use orchestrator::{
    EpisodeSummary, LoopSummary, Orchestrator, OrchestratorSettings, MIN_EPISODE_DURATION,
};
pub use pool::{ConfirmationContext, ConfirmationPool, JobSink, ReceiptJob};
pub use sink::{RecordSender, RecordSink};
pub use submission::SubmissionEngine;

mod confirmation;
mod error;
mod metrics;
mod orchestrator;
mod pool;
mod sink;
mod submission;
