use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

const BATCH_PREFIX: &str = "batch";

/// Grouping key shared by every record created within one episode.
///
/// Batches have no row of their own, the id is only ever stored on
/// `TransactionRecord::batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Wrap an id read back from storage
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mints `batch-YYYYMMDD-HHMMSS` ids (UTC, second resolution).
///
/// Two mints within the same wall-clock second get a zero-padded counter
/// suffix (`batch-20240101-120000-001`), so ids minted by one process never
/// collide. Ids sort lexicographically in mint order as long as fewer than
/// 1000 are minted within one second, past that the suffix outgrows its
/// padding.
#[derive(Debug, Default)]
pub struct BatchIdMinter {
    last: Mutex<Option<(String, u32)>>,
}

impl BatchIdMinter {
    /// Create a minter with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an id for the current wall-clock second
    pub fn mint(&self) -> BatchId {
        self.mint_at(Utc::now())
    }

    /// Mint an id for the second containing `now`
    pub fn mint_at(&self, now: DateTime<Utc>) -> BatchId {
        let base = format!("{}-{}", BATCH_PREFIX, now.format("%Y%m%d-%H%M%S"));
        let mut last = self.last.lock();
        let id = match &mut *last {
            Some((previous, counter)) if *previous == base => {
                *counter = counter.saturating_add(1);
                format!("{base}-{counter:03}")
            }
            slot => {
                *slot = Some((base.clone(), 0));
                base
            }
        };
        BatchId(id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, m, s)
            .single()
            .unwrap()
    }

    #[test]
    fn formats_date_and_time_with_prefix() {
        let minter = BatchIdMinter::new();
        assert_eq!(minter.mint_at(at(7, 5, 3)).as_str(), "batch-20240309-070503");
    }

    #[test]
    fn ids_one_second_apart_are_distinct_and_ordered() {
        let minter = BatchIdMinter::new();
        let first = minter.mint_at(at(12, 0, 0));
        let second = minter.mint_at(at(12, 0, 0) + Duration::seconds(1));
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn same_second_collisions_get_a_counter_suffix() {
        let minter = BatchIdMinter::new();
        let now = at(12, 0, 0);
        let ids: Vec<_> = (0..3).map(|_| minter.mint_at(now)).collect();
        assert_eq!(ids[0].as_str(), "batch-20240309-120000");
        assert_eq!(ids[1].as_str(), "batch-20240309-120000-001");
        assert_eq!(ids[2].as_str(), "batch-20240309-120000-002");

        let next = minter.mint_at(now + Duration::seconds(1));
        assert!(ids.iter().all(|id| *id < next));
    }

    #[test]
    fn suffix_keeps_mint_order_up_to_999() {
        let minter = BatchIdMinter::new();
        let now = at(12, 0, 0);
        let ids: Vec<_> = (0..1000).map(|_| minter.mint_at(now)).collect();
        assert_eq!(ids[999].as_str(), "batch-20240309-120000-999");
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
