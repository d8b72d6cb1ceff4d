use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info_span, trace, warn, Instrument};

use surge_core::{RecordStore, TransactionRecord};

use crate::{JobSink, ReceiptJob, SubmitterError};

#[derive(Debug)]
struct SinkEntry {
    record: TransactionRecord,
    job: Option<ReceiptJob>,
}

/// Producer handle of a `RecordSink`
#[derive(Debug, Clone)]
pub struct RecordSender {
    sender: mpsc::Sender<SinkEntry>,
}

impl RecordSender {
    /// Hand a record to the writer. Its confirmation job, if any, is queued
    /// only once the record insert has been attempted.
    pub async fn push(
        &self,
        record: TransactionRecord,
        job: Option<ReceiptJob>,
    ) -> Result<(), SubmitterError> {
        self.sender
            .send(SinkEntry { record, job })
            .await
            .map_err(|_| SubmitterError::SinkClosed)
    }
}

/// Single writer for record inserts.
///
/// Every insert of an episode goes through one task, so the store never sees
/// concurrent inserts. Status updates bypass the sink, they are written by
/// the confirmation workers.
#[derive(Debug)]
pub struct RecordSink {
    sender: RecordSender,
    writer: JoinHandle<usize>,
}

impl RecordSink {
    /// Start the writer. `jobs` is closed when the sink is.
    pub fn start(store: Arc<dyn RecordStore>, jobs: JobSink, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(
            write_records(receiver, store, jobs).instrument(info_span!("record_sink")),
        );
        Self {
            sender: RecordSender { sender },
            writer,
        }
    }

    /// A new producer handle
    pub fn sender(&self) -> RecordSender {
        self.sender.clone()
    }

    /// Stop accepting records and wait until every queued record is
    /// written. Returns the number of records stored.
    ///
    /// Producer handles still alive keep the writer running, drop them
    /// first.
    pub async fn close(self) -> usize {
        let Self { sender, writer } = self;
        drop(sender);
        match writer.await {
            Ok(stored) => stored,
            Err(err) => {
                error!(error = ?err, "Record writer panicked");
                0
            }
        }
    }
}

async fn write_records(
    mut receiver: mpsc::Receiver<SinkEntry>,
    store: Arc<dyn RecordStore>,
    jobs: JobSink,
) -> usize {
    let mut stored = 0usize;
    while let Some(SinkEntry { record, job }) = receiver.recv().await {
        match store.insert(&record).await {
            Ok(id) => {
                trace!(id, sequence_number = record.sequence_number, "Stored record");
                stored += 1;
            }
            Err(err) => warn!(
                error = ?err,
                sequence_number = record.sequence_number,
                "Could not store transaction record"
            ),
        }
        if let Some(job) = job {
            if let Err(err) = jobs.enqueue(job).await {
                error!(error = %err, "Confirmation queue closed before the record sink");
            }
        }
    }
    debug!(stored, "Record sink closed");
    stored
}
