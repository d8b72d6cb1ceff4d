use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, info_span, instrument, warn, Instrument, Span};
use url::Url;

use surge_core::{
    Account, Address, BatchId, BatchIdMinter, LedgerProvider, TransactionRecord, U256,
};

use crate::{
    sink::RecordSender, ConfirmationContext, ConfirmationPool, ReceiptJob, RecordSink,
    SubmissionEngine, SubmitterMetrics,
};

/// Shortest wall-clock time an episode of loop mode may take
pub const MIN_EPISODE_DURATION: Duration = Duration::from_secs(1);

/// What every episode submits
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Endpoint confirmation workers connect to
    pub endpoint: Url,
    /// Recipient of every transfer
    pub destination: Address,
    /// Amount of every transfer
    pub value: U256,
    /// Transfers per account per episode
    pub transfers_per_account: usize,
    /// Confirmation workers per episode
    pub receipt_workers: usize,
}

/// Submission-side result of one episode. Confirmations may still be
/// running when this is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Batch id shared by every record of the episode
    pub batch_id: BatchId,
    /// Transfers handed to the endpoint, accepted or not
    pub attempted: usize,
    /// Transfers the endpoint accepted
    pub accepted: usize,
    /// Transfers the endpoint or the signer rejected
    pub rejected: usize,
    /// Accounts whose burst could not be prepared
    pub aborted_accounts: usize,
    /// Records the sink stored
    pub stored: usize,
    /// Wall-clock time of the submission phase
    pub elapsed: Duration,
}

impl EpisodeSummary {
    /// Attempted transfers per second of the submission phase
    pub fn tps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of loop mode
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSummary {
    /// Every episode run, in order
    pub episodes: Vec<EpisodeSummary>,
    /// Wall-clock time from the first episode start to the loop end
    pub elapsed: Duration,
}

impl LoopSummary {
    /// Batch ids of every episode, in order
    pub fn batch_ids(&self) -> Vec<BatchId> {
        self.episodes.iter().map(|e| e.batch_id.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct AccountTally {
    accepted: usize,
    rejected: usize,
    aborted: bool,
}

/// Runs execution batches over a fixed account set.
///
/// Accounts submit concurrently, each one sequentially in sequence number
/// order. Running two orchestrators over the same accounts at once is not
/// prevented and will produce sequence number conflicts.
#[derive(Debug)]
pub struct Orchestrator {
    settings: OrchestratorSettings,
    accounts: Vec<Arc<Account>>,
    submission: SubmissionEngine,
    confirmation: ConfirmationContext,
    metrics: SubmitterMetrics,
    minter: BatchIdMinter,
}

impl Orchestrator {
    /// Submit from `accounts` through `provider`, confirming with the
    /// workers described by `confirmation`
    pub fn new(
        settings: OrchestratorSettings,
        accounts: Vec<Account>,
        provider: Arc<dyn LedgerProvider>,
        confirmation: ConfirmationContext,
    ) -> Self {
        let metrics = confirmation.metrics().clone();
        Self {
            settings,
            accounts: accounts.into_iter().map(Arc::new).collect(),
            submission: SubmissionEngine::new(provider, metrics.clone()),
            confirmation,
            metrics,
            minter: BatchIdMinter::new(),
        }
    }

    /// Run one episode and return once every transfer has been submitted
    /// and its record stored.
    ///
    /// The returned pool keeps confirming in the background, drain it before
    /// reading final statuses.
    #[instrument(skip(self), fields(batch_id = tracing::field::Empty))]
    pub async fn run_episode(&self) -> (EpisodeSummary, ConfirmationPool) {
        let batch_id = self.minter.mint();
        Span::current().record("batch_id", batch_id.as_str());
        self.metrics.update_episode_metric();

        // one slot per possible job, so submission never waits on the queue
        let capacity = self
            .accounts
            .len()
            .saturating_mul(self.settings.transfers_per_account);
        let (jobs, pool) = ConfirmationPool::start(
            self.settings.receipt_workers,
            capacity,
            self.confirmation.clone(),
        );
        let sink = RecordSink::start(self.confirmation.store().clone(), jobs, capacity);

        info!(
            accounts = self.accounts.len(),
            transfers_per_account = self.settings.transfers_per_account,
            workers = self.settings.receipt_workers,
            "Starting episode"
        );

        let started = Instant::now();
        let tasks = self
            .accounts
            .iter()
            .map(|account| {
                let span = info_span!("account", address = ?account.address());
                tokio::spawn(
                    submit_account(
                        self.submission.clone(),
                        sink.sender(),
                        self.metrics.clone(),
                        batch_id.clone(),
                        account.clone(),
                        self.settings.clone(),
                    )
                    .instrument(span),
                )
            })
            .collect::<Vec<_>>();

        let mut summary = EpisodeSummary {
            batch_id,
            attempted: 0,
            accepted: 0,
            rejected: 0,
            aborted_accounts: 0,
            stored: 0,
            elapsed: Duration::ZERO,
        };
        for result in join_all(tasks).await {
            match result {
                Ok(tally) => {
                    summary.accepted += tally.accepted;
                    summary.rejected += tally.rejected;
                    summary.aborted_accounts += usize::from(tally.aborted);
                }
                Err(err) => {
                    error!(error = ?err, "Account submission task panicked");
                    summary.aborted_accounts += 1;
                }
            }
        }
        summary.attempted = summary.accepted + summary.rejected;
        summary.elapsed = started.elapsed();
        summary.stored = sink.close().await;

        info!(
            attempted = summary.attempted,
            accepted = summary.accepted,
            rejected = summary.rejected,
            aborted_accounts = summary.aborted_accounts,
            elapsed = ?summary.elapsed,
            tps = summary.tps(),
            "Episode submitted, confirmations continue in the background"
        );
        (summary, pool)
    }

    /// Run episodes back to back until `duration` has elapsed.
    ///
    /// Every episode takes at least `MIN_EPISODE_DURATION`. `on_episode` sees
    /// each summary as soon as its submission phase completes. Pools that
    /// have already drained are dropped along the way, the rest are returned.
    #[instrument(skip(self, on_episode))]
    pub async fn run_loop<F>(
        &self,
        duration: Duration,
        mut on_episode: F,
    ) -> (LoopSummary, Vec<ConfirmationPool>)
    where
        F: FnMut(&EpisodeSummary),
    {
        let started = Instant::now();
        let deadline = started + duration;
        let mut episodes = Vec::new();
        let mut pools: Vec<ConfirmationPool> = Vec::new();

        while Instant::now() < deadline {
            let episode_started = Instant::now();
            info!(
                episode = episodes.len() + 1,
                remaining = ?deadline.saturating_duration_since(episode_started),
                "Starting loop iteration"
            );
            let (summary, pool) = self.run_episode().await;
            on_episode(&summary);
            episodes.push(summary);
            pools.retain(|pool| !pool.is_drained());
            pools.push(pool);

            let floor = episode_started + MIN_EPISODE_DURATION;
            if Instant::now() < floor {
                sleep_until(floor).await;
            }
        }

        let summary = LoopSummary {
            episodes,
            elapsed: started.elapsed(),
        };
        info!(
            episodes = summary.episodes.len(),
            elapsed = ?summary.elapsed,
            "Loop mode completed"
        );
        (summary, pools)
    }
}

async fn submit_account(
    engine: SubmissionEngine,
    sink: RecordSender,
    metrics: SubmitterMetrics,
    batch_id: BatchId,
    account: Arc<Account>,
    settings: OrchestratorSettings,
) -> AccountTally {
    let mut tally = AccountTally::default();
    let requests = match engine
        .prepare_batch(
            account,
            settings.destination,
            settings.value,
            settings.transfers_per_account,
        )
        .await
    {
        Ok(requests) => requests,
        Err(err) => {
            error!(error = %err, "Could not prepare transfers, skipping account");
            metrics.update_aborted_account_metric(err.to_metrics_label());
            tally.aborted = true;
            return tally;
        }
    };

    for request in &requests {
        let submitted = Instant::now();
        let outcome = engine.submit(request).await;
        let job = outcome.operation_hash.map(|operation_hash| {
            ReceiptJob::new(
                operation_hash,
                request.sequence_number,
                settings.endpoint.clone(),
                submitted,
            )
        });
        if outcome.is_accepted() {
            tally.accepted += 1;
        } else {
            tally.rejected += 1;
        }

        let record = TransactionRecord::from_submission(batch_id.clone(), request, &outcome);
        if let Err(err) = sink.push(record, job).await {
            warn!(error = %err, "Record sink closed, stopping account");
            break;
        }
    }

    if let (Some(first), Some(last)) = (requests.first(), requests.last()) {
        info!(
            accepted = tally.accepted,
            rejected = tally.rejected,
            first_sequence_number = first.sequence_number,
            last_sequence_number = last.sequence_number,
            "Account burst submitted"
        );
    }
    tally
}
