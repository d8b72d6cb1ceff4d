use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures_util::future;
use parking_lot::Mutex;
use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, instrument, trace};

use surge_core::{BlockFeed, ConfirmationError, LedgerProvider, Receipt, ReceiptOutcome, H256};

/// Interval between two receipt queries of the poll strategy
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Waits for the terminal outcome of submitted operations.
///
/// Every confirmation races a push strategy, which queries the receipt once
/// per new block seen on the shared `BlockFeed`, against a poll strategy
/// that queries on a fixed interval. The first strategy to find a receipt
/// wins and the other one is dropped. Without a feed only the poll strategy
/// runs.
#[derive(Debug, Clone)]
pub struct ConfirmationEngine {
    provider: Arc<dyn LedgerProvider>,
    block_feed: Option<BlockFeed>,
    poll_interval: Duration,
}

impl ConfirmationEngine {
    /// Confirm through `provider`, using `block_feed` for the push strategy
    pub fn new(provider: Arc<dyn LedgerProvider>, block_feed: Option<BlockFeed>) -> Self {
        Self {
            provider,
            block_feed,
            poll_interval: RECEIPT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait up to `timeout` for the receipt of `operation_hash`.
    ///
    /// Never returns a `Pending` outcome. Latency is measured from
    /// `submitted`, the instant the operation was handed to the endpoint.
    #[instrument(skip(self, submitted))]
    pub async fn await_confirmation(
        &self,
        operation_hash: H256,
        submitted: Instant,
        timeout: Duration,
    ) -> ReceiptOutcome {
        let last_error = Mutex::new(None::<String>);
        let race = async {
            tokio::select! {
                receipt = self.push(operation_hash, &last_error) => receipt,
                receipt = self.poll(operation_hash, &last_error) => receipt,
            }
        };
        let result = tokio::time::timeout(timeout, race).await;

        let latency_ms = submitted.elapsed().as_secs_f64() * 1000.0;
        let confirmed_at = Utc::now();
        match result {
            Ok(receipt) if receipt.succeeded => {
                debug!(block = ?receipt.block_number, latency_ms, "Operation confirmed");
                ReceiptOutcome::success(confirmed_at, latency_ms)
            }
            Ok(receipt) => {
                debug!(block = ?receipt.block_number, "Operation reverted");
                ReceiptOutcome::failure(confirmed_at, latency_ms, ConfirmationError::Reverted)
            }
            Err(_) => {
                let error = match last_error.into_inner() {
                    Some(err) => ConfirmationError::Endpoint(err),
                    None => ConfirmationError::Timeout,
                };
                debug!(%error, "Gave up waiting for receipt");
                ReceiptOutcome::failure(confirmed_at, latency_ms, error)
            }
        }
    }

    async fn push(&self, operation_hash: H256, last_error: &Mutex<Option<String>>) -> Receipt {
        let Some(feed) = &self.block_feed else {
            return future::pending().await;
        };
        let mut blocks = feed.subscribe();
        loop {
            match blocks.recv().await {
                Ok(block) => trace!(block, "New block"),
                // missed blocks still mean the chain moved
                Err(RecvError::Lagged(skipped)) => trace!(skipped, "Block feed lagged"),
                Err(RecvError::Closed) => return future::pending().await,
            }
            if let Some(receipt) = self.query(operation_hash, last_error).await {
                return receipt;
            }
        }
    }

    async fn poll(&self, operation_hash: H256, last_error: &Mutex<Option<String>>) -> Receipt {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(receipt) = self.query(operation_hash, last_error).await {
                return receipt;
            }
        }
    }

    async fn query(
        &self,
        operation_hash: H256,
        last_error: &Mutex<Option<String>>,
    ) -> Option<Receipt> {
        match self.provider.get_receipt(operation_hash).await {
            Ok(receipt) => {
                *last_error.lock() = None;
                receipt
            }
            Err(err) => {
                trace!(error = %err, "Receipt query failed");
                *last_error.lock() = Some(err.to_string());
                None
            }
        }
    }
}
