use chrono::{DateTime, Utc};
use eyre::Result;
use sea_orm::{
    prelude::*,
    sea_query::{Expr, Func, SimpleExpr},
    QueryOrder, QuerySelect,
};
use serde::Serialize;
use tracing::instrument;

use surge_core::{BatchId, TransactionStatus};

use super::{entities::transaction, SurgeDb};

/// Aggregates over every stored record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionStats {
    /// Number of records
    pub total: u64,
    /// Records in `success`
    pub successful: u64,
    /// Records in `failed`
    pub failed: u64,
    /// Records still `pending`
    pub pending: u64,
    /// Average latency over records with a positive latency
    pub avg_latency_ms: f64,
    /// Successful records per second of their submission window
    pub submission_tps: f64,
    /// Seconds between the first and last successful submission
    pub submission_window_secs: f64,
    /// Successful records per second of their confirmation window
    pub confirmation_tps: f64,
    /// Seconds between the first and last confirmation
    pub confirmation_window_secs: f64,
}

/// Aggregates over the records of one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    /// The batch these numbers describe
    pub batch_id: BatchId,
    /// Number of records
    pub total: u64,
    /// Records in `success`
    pub successful: u64,
    /// Records in `failed`
    pub failed: u64,
    /// Records still `pending`
    pub pending: u64,
    /// Average latency over records with a positive latency
    pub avg_latency_ms: f64,
    /// First submission of the batch
    pub started_at: Option<DateTime<Utc>>,
    /// Last submission of the batch
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between the first and last submission
    pub duration_secs: f64,
    /// Records per second of the submission window, zero for an empty window
    pub tps: f64,
}

/// A failed record as listed in the end-of-episode report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    /// Sending account
    pub account_address: String,
    /// Sequence number of the failed transfer
    pub sequence_number: u64,
    /// Why it failed
    pub error: String,
    /// Operation hash, absent when submission itself failed
    pub operation_hash: Option<String>,
}

#[derive(Debug, Default)]
struct StatusBucket {
    count: u64,
    first_submitted: Option<DateTime<Utc>>,
    last_submitted: Option<DateTime<Utc>>,
    first_confirmed: Option<DateTime<Utc>>,
    last_confirmed: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StatusBreakdown {
    success: StatusBucket,
    failed: StatusBucket,
    pending: StatusBucket,
}

impl StatusBreakdown {
    fn total(&self) -> u64 {
        self.success.count + self.failed.count + self.pending.count
    }

    fn buckets(&self) -> [&StatusBucket; 3] {
        [&self.success, &self.failed, &self.pending]
    }

    fn first_submitted(&self) -> Option<DateTime<Utc>> {
        self.buckets().iter().filter_map(|b| b.first_submitted).min()
    }

    fn last_submitted(&self) -> Option<DateTime<Utc>> {
        self.buckets().iter().filter_map(|b| b.last_submitted).max()
    }
}

type BucketRow = (
    String,
    i64,
    Option<DateTimeUtc>,
    Option<DateTimeUtc>,
    Option<DateTimeUtc>,
    Option<DateTimeUtc>,
);

fn window_secs(first: Option<DateTime<Utc>>, last: Option<DateTime<Utc>>) -> f64 {
    match (first, last) {
        (Some(first), Some(last)) if last > first => {
            (last - first).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6
        }
        _ => 0.0,
    }
}

fn per_second(count: u64, window_secs: f64) -> f64 {
    if window_secs > 0.0 {
        count as f64 / window_secs
    } else {
        0.0
    }
}

impl SurgeDb {
    async fn status_breakdown(&self, batch_id: Option<&BatchId>) -> Result<StatusBreakdown> {
        let mut query = transaction::Entity::find()
            .select_only()
            .column(transaction::Column::Status)
            .column_as(Expr::col(transaction::Column::Id).count(), "count")
            .column_as(
                Expr::col(transaction::Column::SubmittedAt).min(),
                "first_submitted",
            )
            .column_as(
                Expr::col(transaction::Column::SubmittedAt).max(),
                "last_submitted",
            )
            .column_as(
                Expr::col(transaction::Column::ConfirmedAt).min(),
                "first_confirmed",
            )
            .column_as(
                Expr::col(transaction::Column::ConfirmedAt).max(),
                "last_confirmed",
            )
            .group_by(transaction::Column::Status);
        if let Some(batch_id) = batch_id {
            query = query.filter(transaction::Column::BatchId.eq(batch_id.as_str()));
        }

        let rows: Vec<BucketRow> = query.into_tuple().all(&self.0).await?;

        let mut breakdown = StatusBreakdown::default();
        for (status, count, first_submitted, last_submitted, first_confirmed, last_confirmed) in
            rows
        {
            let bucket = StatusBucket {
                count: u64::try_from(count)?,
                first_submitted,
                last_submitted,
                first_confirmed,
                last_confirmed,
            };
            match status.parse::<TransactionStatus>() {
                Ok(TransactionStatus::Success) => breakdown.success = bucket,
                Ok(TransactionStatus::Failed) => breakdown.failed = bucket,
                Ok(TransactionStatus::Pending) => breakdown.pending = bucket,
                Err(_) => tracing::warn!(%status, "Ignoring records with unknown status"),
            }
        }
        Ok(breakdown)
    }

    async fn average_latency(&self, batch_id: Option<&BatchId>) -> Result<f64> {
        let avg: SimpleExpr = Func::avg(Expr::col(transaction::Column::LatencyMs)).into();
        let mut query = transaction::Entity::find()
            .select_only()
            .column_as(avg, "avg_latency")
            .filter(transaction::Column::LatencyMs.gt(0.0));
        if let Some(batch_id) = batch_id {
            query = query.filter(transaction::Column::BatchId.eq(batch_id.as_str()));
        }
        let avg: Option<Option<f64>> = query.into_tuple().one(&self.0).await?;
        Ok(avg.flatten().unwrap_or_default())
    }

    /// Counts, average latency and throughput over every stored record
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<TransactionStats> {
        let breakdown = self.status_breakdown(None).await?;
        let avg_latency_ms = self.average_latency(None).await?;

        let success = &breakdown.success;
        let submission_window_secs = window_secs(success.first_submitted, success.last_submitted);
        let confirmation_window_secs =
            window_secs(success.first_confirmed, success.last_confirmed);

        Ok(TransactionStats {
            total: breakdown.total(),
            successful: success.count,
            failed: breakdown.failed.count,
            pending: breakdown.pending.count,
            avg_latency_ms,
            submission_tps: per_second(success.count, submission_window_secs),
            submission_window_secs,
            confirmation_tps: per_second(success.count, confirmation_window_secs),
            confirmation_window_secs,
        })
    }

    /// Counts, average latency and throughput over the records of one batch
    #[instrument(skip(self))]
    pub async fn batch_stats(&self, batch_id: &BatchId) -> Result<BatchStats> {
        let breakdown = self.status_breakdown(Some(batch_id)).await?;
        let avg_latency_ms = self.average_latency(Some(batch_id)).await?;

        let started_at = breakdown.first_submitted();
        let completed_at = breakdown.last_submitted();
        let duration_secs = window_secs(started_at, completed_at);
        let total = breakdown.total();

        Ok(BatchStats {
            batch_id: batch_id.clone(),
            total,
            successful: breakdown.success.count,
            failed: breakdown.failed.count,
            pending: breakdown.pending.count,
            avg_latency_ms,
            started_at,
            completed_at,
            duration_secs,
            tps: per_second(total, duration_secs),
        })
    }

    /// Every batch id in the store, newest first
    #[instrument(skip(self))]
    pub async fn list_batches(&self) -> Result<Vec<BatchId>> {
        let ids: Vec<String> = transaction::Entity::find()
            .select_only()
            .column(transaction::Column::BatchId)
            .distinct()
            .order_by_desc(transaction::Column::BatchId)
            .into_tuple()
            .all(&self.0)
            .await?;
        Ok(ids.into_iter().map(BatchId::new).collect())
    }

    /// Failed records of a batch that carry an error, in insertion order.
    /// A `limit` of zero lists all of them.
    #[instrument(skip(self))]
    pub async fn failed_records(&self, batch_id: &BatchId, limit: u64) -> Result<Vec<FailedRecord>> {
        let mut query = transaction::Entity::find()
            .filter(transaction::Column::BatchId.eq(batch_id.as_str()))
            .filter(transaction::Column::Status.eq(TransactionStatus::Failed.to_string()))
            .filter(transaction::Column::Error.is_not_null())
            .filter(transaction::Column::Error.ne(""))
            .order_by_asc(transaction::Column::Id);
        if limit > 0 {
            query = query.limit(limit);
        }

        query
            .all(&self.0)
            .await?
            .into_iter()
            .map(|model| {
                Ok(FailedRecord {
                    account_address: model.account_address,
                    sequence_number: u64::try_from(model.sequence_number)?,
                    error: model.error.unwrap_or_default(),
                    operation_hash: model.operation_hash,
                })
            })
            .collect()
    }
}
