use std::{sync::Arc, time::Duration};

use derive_new::new;
use futures_util::future::join_all;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{timeout_at, Instant},
};
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

use surge_core::{
    BlockFeed, ConfirmationError, LedgerConnector, ReceiptOutcome, RecordStore, TransactionStatus,
    H256,
};

use crate::{ConfirmationEngine, SubmitterError, SubmitterMetrics, RECEIPT_POLL_INTERVAL};

/// A submitted operation waiting for its terminal status.
#[derive(Debug, Clone, new)]
pub struct ReceiptJob {
    /// Hash returned by the endpoint
    pub operation_hash: H256,
    /// Sequence number, for logging only
    pub sequence_number: u64,
    /// Endpoint the worker should query
    pub endpoint: Url,
    /// When the operation was handed to the endpoint
    pub submitted: Instant,
}

/// What every confirmation worker of a pool shares.
#[derive(Debug, Clone, new)]
pub struct ConfirmationContext {
    connector: Arc<dyn LedgerConnector>,
    block_feed: Option<BlockFeed>,
    store: Arc<dyn RecordStore>,
    receipt_timeout: Duration,
    metrics: SubmitterMetrics,
    #[new(value = "RECEIPT_POLL_INTERVAL")]
    poll_interval: Duration,
}

impl ConfirmationContext {
    /// Override the poll interval of every confirmation
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn metrics(&self) -> &SubmitterMetrics {
        &self.metrics
    }
}

/// Producer side of a pool's job queue. Dropping every clone closes the
/// queue, after which workers finish the queued jobs and exit.
#[derive(Debug, Clone)]
pub struct JobSink {
    sender: mpsc::Sender<ReceiptJob>,
    metrics: SubmitterMetrics,
}

impl JobSink {
    /// Queue a confirmation job, waiting for space if the queue is full
    pub async fn enqueue(&self, job: ReceiptJob) -> Result<(), SubmitterError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| SubmitterError::SinkClosed)?;
        let queued = self
            .sender
            .max_capacity()
            .saturating_sub(self.sender.capacity());
        self.metrics.update_queue_length_metric(queued);
        Ok(())
    }
}

/// A fixed set of confirmation workers pulling from one bounded queue.
///
/// At most `worker_count` confirmations hold an endpoint connection at any
/// time, however many jobs are queued.
#[derive(Debug)]
pub struct ConfirmationPool {
    workers: Vec<JoinHandle<()>>,
}

impl ConfirmationPool {
    /// Spawn `worker_count` workers behind a queue holding up to
    /// `queue_capacity` jobs
    pub fn start(
        worker_count: usize,
        queue_capacity: usize,
        context: ConfirmationContext,
    ) -> (JobSink, Self) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(
                    run_worker(receiver.clone(), context.clone())
                        .instrument(info_span!("confirmation_worker", worker_id)),
                )
            })
            .collect();
        let sink = JobSink {
            sender,
            metrics: context.metrics,
        };
        (sink, Self { workers })
    }

    /// Whether every worker has exited
    pub fn is_drained(&self) -> bool {
        self.workers.iter().all(JoinHandle::is_finished)
    }

    /// Wait for the workers to exit, giving up after `grace`. Returns
    /// whether every worker exited.
    pub async fn drain(self, grace: Duration) -> bool {
        self.drain_until(Instant::now() + grace).await
    }

    /// Wait for the workers to exit, giving up at `deadline`.
    ///
    /// Workers still running at the deadline are left to finish on their
    /// own, their records stay `pending` until they do.
    pub async fn drain_until(self, deadline: Instant) -> bool {
        let worker_count = self.workers.len();
        match timeout_at(deadline, join_all(self.workers)).await {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    error!(error = ?err, "Confirmation worker panicked");
                }
                debug!(worker_count, "Confirmation pool drained");
                true
            }
            Err(_) => {
                warn!(worker_count, "Confirmation pool still busy at drain deadline");
                false
            }
        }
    }
}

async fn run_worker(jobs: Arc<Mutex<mpsc::Receiver<ReceiptJob>>>, context: ConfirmationContext) {
    let mut connection: Option<(Url, ConfirmationEngine)> = None;
    loop {
        let job = {
            let mut receiver = jobs.lock().await;
            let job = receiver.recv().await;
            context.metrics.update_queue_length_metric(receiver.len());
            job
        };
        let Some(job) = job else {
            break;
        };

        let engine = match &connection {
            Some((url, engine)) if *url == job.endpoint => engine.clone(),
            _ => match context.connector.connect(&job.endpoint).await {
                Ok(provider) => {
                    let engine = ConfirmationEngine::new(provider, context.block_feed.clone())
                        .with_poll_interval(context.poll_interval);
                    connection = Some((job.endpoint.clone(), engine.clone()));
                    engine
                }
                Err(err) => {
                    // the record stays pending
                    error!(
                        error = %err,
                        operation_hash = ?job.operation_hash,
                        "Could not connect to ledger endpoint, skipping confirmation"
                    );
                    context.metrics.update_connection_failure_metric();
                    connection = None;
                    continue;
                }
            },
        };

        confirm(&engine, &job, &context).await;
    }
    debug!("Job queue closed, worker exiting");
}

async fn confirm(engine: &ConfirmationEngine, job: &ReceiptJob, context: &ConfirmationContext) {
    let in_flight = context.metrics.confirmations_in_flight();
    in_flight.inc();
    let outcome = engine
        .await_confirmation(job.operation_hash, job.submitted, context.receipt_timeout)
        .await;
    in_flight.dec();

    context.metrics.update_confirmation_metric(
        outcome_label(&outcome),
        outcome.status,
        outcome.latency_ms,
    );
    match (&outcome.status, &outcome.error) {
        (TransactionStatus::Success, _) => info!(
            sequence_number = job.sequence_number,
            latency_ms = outcome.latency_ms,
            "Transfer confirmed"
        ),
        (_, error) => warn!(
            sequence_number = job.sequence_number,
            operation_hash = ?job.operation_hash,
            ?error,
            "Transfer failed"
        ),
    }

    match context
        .store
        .update_status(job.operation_hash, &outcome.into_update())
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!(
            operation_hash = ?job.operation_hash,
            "Record already terminal or missing, update skipped"
        ),
        Err(err) => error!(
            error = ?err,
            operation_hash = ?job.operation_hash,
            "Failed to store confirmation outcome"
        ),
    }
}

fn outcome_label(outcome: &ReceiptOutcome) -> &'static str {
    match &outcome.error {
        None => "success",
        Some(ConfirmationError::Reverted) => "reverted",
        Some(ConfirmationError::Timeout) => "timeout",
        Some(ConfirmationError::Endpoint(_)) => "endpoint_error",
    }
}
