use tokio::sync::broadcast;

/// Default number of block notifications buffered per subscriber.
pub const DEFAULT_BLOCK_FEED_CAPACITY: usize = 64;

/// Fan-out of new-block notifications from a single push subscription.
///
/// The feed is read-only shared state: every confirmation worker holds a
/// clone and subscribes per confirmation, nothing downstream can publish.
/// Slow subscribers observe `RecvError::Lagged`, which callers treat as "a
/// block happened".
#[derive(Debug, Clone)]
pub struct BlockFeed {
    sender: broadcast::Sender<u64>,
}

impl BlockFeed {
    /// Create a feed buffering `capacity` notifications per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a new block number, returning how many subscribers saw it
    pub fn publish(&self, block_number: u64) -> usize {
        self.sender.send(block_number).unwrap_or(0)
    }

    /// Subscribe to notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BlockFeed {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_published_blocks() {
        let feed = BlockFeed::default();
        let mut a = feed.subscribe();
        let mut b = feed.clone().subscribe();

        assert_eq!(feed.publish(42), 2);
        assert_eq!(a.recv().await.unwrap(), 42);
        assert_eq!(b.recv().await.unwrap(), 42);
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let feed = BlockFeed::new(4);
        assert_eq!(feed.publish(1), 0);
    }
}
