use std::sync::Arc;

use eyre::{Context, Result};
use prometheus::Registry;
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{info, instrument, warn};

use submitter::{
    ConfirmationContext, ConfirmationPool, Orchestrator, OrchestratorSettings, SubmitterMetrics,
    MIN_EPISODE_DURATION,
};
use surge_base::{settings::Settings, CoreMetrics, Server, SurgeDb};
use surge_core::{Account, BatchId, BlockFeed, LedgerProvider};
use surge_ethereum::{connect_block_feed, EthereumLedger, HttpConnector};

use crate::{accounts, report, AGENT_NAME};

/// Everything the tester needs, connected and ready to submit
#[derive(Debug)]
pub struct TpsTester {
    settings: Settings,
    db: SurgeDb,
    provider: Arc<dyn LedgerProvider>,
    block_feed: Option<BlockFeed>,
    accounts: Vec<Account>,
    metrics: SubmitterMetrics,
    _metrics_server: Option<JoinHandle<Result<()>>>,
}

impl TpsTester {
    /// Open the record store and the endpoint connections and derive the
    /// accounts. Any failure here aborts the process.
    #[instrument(skip_all)]
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let core_metrics = Arc::new(CoreMetrics::new(
            AGENT_NAME,
            settings.metrics_port,
            Registry::new(),
        )?);
        let metrics = SubmitterMetrics::new(&core_metrics)?;
        let metrics_server = settings
            .metrics_port
            .map(|port| Arc::new(Server::new(port, core_metrics.clone())).run());

        let db = SurgeDb::connect(&settings.db).await?;
        db.migrate().await?;
        info!(db = %settings.db, "Record store ready");

        let provider: Arc<dyn LedgerProvider> = Arc::new(
            EthereumLedger::connect(&settings.rpc_url)
                .await
                .context("Failed to connect to the ledger endpoint")?,
        );
        info!(url = %settings.rpc_url, "Connected to ledger endpoint");

        let block_feed = match &settings.ws_url {
            Some(url) => {
                let feed = BlockFeed::default();
                match connect_block_feed(url, feed.clone()).await {
                    Ok(_) => {
                        info!(%url, "Subscribed to new blocks");
                        Some(feed)
                    }
                    Err(err) => {
                        warn!(error = %err, "Could not subscribe to new blocks, confirmations will poll");
                        None
                    }
                }
            }
            None => {
                info!("No push endpoint configured, confirmations will poll");
                None
            }
        };

        let accounts = accounts::load_accounts(&settings)?;
        accounts::register_wallets(&db, &accounts).await?;

        Ok(Self {
            settings,
            db,
            provider,
            block_feed,
            accounts,
            metrics,
            _metrics_server: metrics_server,
        })
    }

    /// Show balances, ask for confirmation unless `assume_yes`, run the
    /// configured mode, wait for confirmations and print the report
    pub async fn run(self, assume_yes: bool) -> Result<()> {
        let balances = accounts::check_balances(self.provider.as_ref(), &self.accounts).await;
        report::print_balances(&balances);

        if !assume_yes && !accounts::ask_to_proceed().await? {
            println!("\nOperation cancelled by user.");
            println!("Please fund the wallets and try again.");
            return Ok(());
        }

        let orchestrator = self.orchestrator();
        let (batch_ids, pools) = if self.settings.loop_mode() {
            println!(
                "Running in LOOP MODE for {} minutes",
                self.settings.run_duration.as_secs() / 60
            );
            let (summary, pools) = orchestrator
                .run_loop(self.settings.run_duration, report::print_episode)
                .await;
            report::print_loop(&summary);
            (summary.batch_ids(), pools)
        } else {
            println!("Running in SINGLE MODE");
            let started = Instant::now();
            let (summary, pool) = orchestrator.run_episode().await;
            report::print_episode(&summary);
            sleep_until(started + MIN_EPISODE_DURATION).await;
            (vec![summary.batch_id], vec![pool])
        };

        self.drain(pools).await;
        self.report(&batch_ids).await
    }

    fn orchestrator(&self) -> Orchestrator {
        let settings = OrchestratorSettings {
            endpoint: self.settings.rpc_url.clone(),
            destination: self.settings.to_address,
            value: self.settings.value,
            transfers_per_account: self.settings.tx_per_wallet,
            receipt_workers: self.settings.receipt_workers,
        };
        let confirmation = ConfirmationContext::new(
            Arc::new(HttpConnector),
            self.block_feed.clone(),
            Arc::new(self.db.clone()),
            self.settings.receipt_timeout,
            self.metrics.clone(),
        );
        Orchestrator::new(
            settings,
            self.accounts.clone(),
            self.provider.clone(),
            confirmation,
        )
    }

    async fn drain(&self, pools: Vec<ConfirmationPool>) {
        println!(
            "\nWaiting up to {} seconds for pending confirmations...",
            self.settings.drain_grace.as_secs()
        );
        let deadline = Instant::now() + self.settings.drain_grace;
        let mut drained = true;
        for pool in pools {
            drained &= pool.drain_until(deadline).await;
        }
        if !drained {
            warn!("Some confirmations were still running at exit, their records stay pending");
        }
    }

    async fn report(&self, batch_ids: &[BatchId]) -> Result<()> {
        for batch_id in batch_ids {
            let stats = self.db.batch_stats(batch_id).await?;
            let failed = self
                .db
                .failed_records(batch_id, report::FAILED_RECORDS_SHOWN)
                .await?;
            report::print_batch(&stats, &failed);
        }
        let stats = self.db.stats().await?;
        report::print_stats(&stats, &self.settings.db);
        if self.settings.mnemonic.is_none() {
            println!("Mnemonic saved to: {}", self.settings.mnemonic_file.display());
        }
        Ok(())
    }
}
