use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use eyre::{ensure, eyre, Context, Result};
use sea_orm::{
    prelude::*,
    sea_query::{Expr, OnConflict},
    ActiveValue::*,
    ConnectOptions, Database, DbConn, QueryOrder,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, instrument, trace};

use surge_core::{
    Address, BatchId, RecordStore, StatusUpdate, TransactionRecord, TransactionStatus, H256, U256,
};

pub use migration::Migrator;
pub use report::*;

use entities::{transaction, wallet};

#[allow(clippy::all)]
mod entities;
mod migration;
mod report;

#[cfg(test)]
mod tests;

/// SQLite-backed record store.
///
/// Inserts are expected to come from a single writer, status updates may be
/// issued concurrently since each one targets a distinct operation hash.
#[derive(Clone, Debug)]
pub struct SurgeDb(DbConn);

impl SurgeDb {
    /// Connect to the database at `url`, e.g. `sqlite://./transactions.db?mode=rwc`
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .with_context(|| format!("Failed to open record store at {url}"))?;
        Ok(Self(db))
    }

    /// A migrated, private in-memory database
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        // every pooled connection would otherwise see its own empty database
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Self(Database::connect(options).await?);
        db.migrate().await?;
        Ok(db)
    }

    /// Create or upgrade the schema
    pub async fn migrate(&self) -> Result<()> {
        Migrator::up(&self.0, None)
            .await
            .context("Failed to migrate record store")
    }

    /// Register a derived account. Returns `false` if the address is already
    /// registered.
    #[instrument(skip(self))]
    pub async fn insert_wallet(&self, address: Address, derivation_path: &str) -> Result<bool> {
        let model = wallet::ActiveModel {
            id: NotSet,
            address: Set(format_address(&address)),
            derivation_path: Set(derivation_path.to_owned()),
            created_at: Set(Utc::now()),
        };
        let inserted = wallet::Entity::insert(model)
            .on_conflict(
                OnConflict::column(wallet::Column::Address)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.0)
            .await?;
        Ok(inserted > 0)
    }

    /// Every record of a batch, in insertion order
    #[instrument(skip(self))]
    pub async fn records_for_batch(&self, batch_id: &BatchId) -> Result<Vec<TransactionRecord>> {
        transaction::Entity::find()
            .filter(transaction::Column::BatchId.eq(batch_id.as_str()))
            .order_by_asc(transaction::Column::Id)
            .all(&self.0)
            .await?
            .into_iter()
            .map(record_from_model)
            .collect()
    }

    /// The record carrying `operation_hash`, if any
    pub async fn record_by_hash(&self, operation_hash: H256) -> Result<Option<TransactionRecord>> {
        transaction::Entity::find()
            .filter(transaction::Column::OperationHash.eq(format_hash(&operation_hash)))
            .one(&self.0)
            .await?
            .map(record_from_model)
            .transpose()
    }
}

#[async_trait]
impl RecordStore for SurgeDb {
    #[instrument(skip_all, fields(batch_id = %record.batch_id, sequence_number = record.sequence_number))]
    async fn insert(&self, record: &TransactionRecord) -> Result<i64> {
        let model = transaction::ActiveModel {
            id: NotSet,
            batch_id: Set(record.batch_id.to_string()),
            account_address: Set(format_address(&record.account_address)),
            operation_hash: Set(record.operation_hash.as_ref().map(format_hash)),
            sequence_number: Set(i64::try_from(record.sequence_number)
                .context("Sequence number does not fit the schema")?),
            destination: Set(format_address(&record.destination)),
            value: Set(record.value.to_string()),
            fee_price: Set(record.fee_price.to_string()),
            fee_limit: Set(
                i64::try_from(record.fee_limit).context("Fee limit does not fit the schema")?
            ),
            status: Set(record.status.to_string()),
            submitted_at: Set(record.submitted_at),
            confirmed_at: Set(record.confirmed_at),
            latency_ms: Set(record.latency_ms),
            error: Set(record.error.clone()),
        };
        let id = transaction::Entity::insert(model)
            .exec(&self.0)
            .await?
            .last_insert_id;
        trace!(id, "Inserted transaction record");
        Ok(id)
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_status(&self, operation_hash: H256, update: &StatusUpdate) -> Result<bool> {
        ensure!(
            update.status.is_terminal(),
            "Refusing to move {operation_hash:?} back to {}",
            update.status
        );
        let result = transaction::Entity::update_many()
            .col_expr(
                transaction::Column::Status,
                Expr::value(update.status.to_string()),
            )
            .col_expr(
                transaction::Column::ConfirmedAt,
                Expr::value(Some(update.confirmed_at)),
            )
            .col_expr(
                transaction::Column::LatencyMs,
                Expr::value(update.latency_ms),
            )
            .col_expr(transaction::Column::Error, Expr::value(update.error.clone()))
            .filter(transaction::Column::OperationHash.eq(format_hash(&operation_hash)))
            .filter(transaction::Column::Status.eq(TransactionStatus::Pending.to_string()))
            .exec(&self.0)
            .await?;
        if result.rows_affected == 0 {
            debug!(?operation_hash, "No pending record to update");
        }
        Ok(result.rows_affected > 0)
    }
}

fn format_address(address: &Address) -> String {
    format!("{address:?}")
}

fn format_hash(hash: &H256) -> String {
    format!("{hash:?}")
}

fn record_from_model(model: transaction::Model) -> Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: Some(model.id),
        batch_id: BatchId::new(model.batch_id),
        account_address: Address::from_str(&model.account_address)
            .map_err(|err| eyre!("Stored account address is malformed: {err}"))?,
        operation_hash: model
            .operation_hash
            .as_deref()
            .map(H256::from_str)
            .transpose()
            .map_err(|err| eyre!("Stored operation hash is malformed: {err}"))?,
        sequence_number: u64::try_from(model.sequence_number)?,
        destination: Address::from_str(&model.destination)
            .map_err(|err| eyre!("Stored destination is malformed: {err}"))?,
        value: U256::from_dec_str(&model.value)
            .map_err(|err| eyre!("Stored value is malformed: {err}"))?,
        fee_price: U256::from_dec_str(&model.fee_price)
            .map_err(|err| eyre!("Stored fee price is malformed: {err}"))?,
        fee_limit: u64::try_from(model.fee_limit)?,
        status: TransactionStatus::from_str(&model.status)
            .with_context(|| format!("Unknown status `{}`", model.status))?,
        submitted_at: model.submitted_at,
        confirmed_at: model.confirmed_at,
        latency_ms: model.latency_ms,
        error: model.error,
    })
}
