use chrono::{Duration, TimeZone, Utc};

use surge_core::{
    Address, BatchId, RecordStore, StatusUpdate, TransactionRecord, TransactionStatus, H256, U256,
};

use super::*;

fn record(batch: &str, sequence_number: u64, hash: Option<u64>) -> TransactionRecord {
    let submitted_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap()
        + Duration::seconds(sequence_number as i64);
    TransactionRecord {
        id: None,
        batch_id: BatchId::new(batch),
        account_address: Address::from_low_u64_be(0xaa),
        operation_hash: hash.map(H256::from_low_u64_be),
        sequence_number,
        destination: Address::from_low_u64_be(1),
        value: U256::exp10(15),
        fee_price: U256::from(1_000_000_000u64),
        fee_limit: 21_000,
        status: if hash.is_some() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Failed
        },
        submitted_at,
        confirmed_at: None,
        latency_ms: 4.0,
        error: hash.is_none().then(|| "insufficient funds".to_owned()),
    }
}

fn terminal(status: TransactionStatus, seconds_after: i64, error: Option<&str>) -> StatusUpdate {
    StatusUpdate {
        status,
        confirmed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).single().unwrap()
            + Duration::seconds(seconds_after),
        latency_ms: 1500.0,
        error: error.map(str::to_owned),
    }
}

#[tokio::test]
async fn insert_then_read_back() {
    let db = SurgeDb::in_memory().await.unwrap();
    let original = record("batch-a", 7, Some(1));
    let id = db.insert(&original).await.unwrap();

    let stored = db.records_for_batch(&BatchId::new("batch-a")).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, Some(id));
    assert_eq!(
        stored[0],
        TransactionRecord {
            id: Some(id),
            ..original
        }
    );
}

#[tokio::test]
async fn terminal_status_is_written_once() {
    let db = SurgeDb::in_memory().await.unwrap();
    let hash = H256::from_low_u64_be(9);
    db.insert(&record("batch-a", 0, Some(9))).await.unwrap();

    let first = terminal(TransactionStatus::Success, 0, None);
    assert!(db.update_status(hash, &first).await.unwrap());

    let second = terminal(TransactionStatus::Failed, 5, Some("late"));
    assert!(!db.update_status(hash, &second).await.unwrap());

    let stored = db.record_by_hash(hash).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Success);
    assert_eq!(stored.confirmed_at, Some(first.confirmed_at));
    assert_eq!(stored.latency_ms, 1500.0);
    assert_eq!(stored.error, None);
}

#[tokio::test]
async fn unknown_hash_is_a_no_op() {
    let db = SurgeDb::in_memory().await.unwrap();
    let update = terminal(TransactionStatus::Failed, 0, Some("timeout"));
    assert!(!db
        .update_status(H256::from_low_u64_be(404), &update)
        .await
        .unwrap());
}

#[tokio::test]
async fn pending_is_not_a_valid_update() {
    let db = SurgeDb::in_memory().await.unwrap();
    db.insert(&record("batch-a", 0, Some(3))).await.unwrap();
    let update = terminal(TransactionStatus::Pending, 0, None);
    assert!(db
        .update_status(H256::from_low_u64_be(3), &update)
        .await
        .is_err());
}

#[tokio::test]
async fn batch_stats_and_failures() {
    let db = SurgeDb::in_memory().await.unwrap();
    for (seq, hash) in [(0, Some(10)), (1, None), (2, Some(12)), (3, Some(13))] {
        db.insert(&record("batch-b", seq, hash)).await.unwrap();
    }
    db.insert(&record("batch-a", 0, Some(99))).await.unwrap();

    db.update_status(
        H256::from_low_u64_be(10),
        &terminal(TransactionStatus::Success, 0, None),
    )
    .await
    .unwrap();
    db.update_status(
        H256::from_low_u64_be(12),
        &terminal(TransactionStatus::Failed, 1, Some("transaction reverted")),
    )
    .await
    .unwrap();

    let batch = BatchId::new("batch-b");
    let stats = db.batch_stats(&batch).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.duration_secs, 3.0);
    assert!((stats.tps - 4.0 / 3.0).abs() < 1e-9);

    let failed = db.failed_records(&batch, 20).await.unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].sequence_number, 1);
    assert_eq!(failed[0].error, "insufficient funds");
    assert!(failed[0].operation_hash.is_none());
    assert_eq!(failed[1].error, "transaction reverted");

    assert_eq!(db.failed_records(&batch, 1).await.unwrap().len(), 1);

    assert_eq!(
        db.list_batches().await.unwrap(),
        vec![BatchId::new("batch-b"), BatchId::new("batch-a")]
    );
}

#[tokio::test]
async fn overall_stats_cover_every_batch() {
    let db = SurgeDb::in_memory().await.unwrap();
    db.insert(&record("batch-a", 0, Some(1))).await.unwrap();
    db.insert(&record("batch-a", 2, Some(2))).await.unwrap();
    db.insert(&record("batch-b", 1, None)).await.unwrap();
    for (hash, after) in [(1, 0), (2, 4)] {
        db.update_status(
            H256::from_low_u64_be(hash),
            &terminal(TransactionStatus::Success, after, None),
        )
        .await
        .unwrap();
    }

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.submission_window_secs, 2.0);
    assert_eq!(stats.submission_tps, 1.0);
    assert_eq!(stats.confirmation_window_secs, 4.0);
    assert_eq!(stats.confirmation_tps, 0.5);
    // two confirmed at 1500ms, one rejected at 4ms
    assert!((stats.avg_latency_ms - (1500.0 * 2.0 + 4.0) / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn wallets_are_unique_by_address() {
    let db = SurgeDb::in_memory().await.unwrap();
    let address = Address::from_low_u64_be(0xbeef);
    assert!(db.insert_wallet(address, "m/44'/60'/0'/0/0").await.unwrap());
    assert!(!db.insert_wallet(address, "m/44'/60'/0'/0/0").await.unwrap());
}
