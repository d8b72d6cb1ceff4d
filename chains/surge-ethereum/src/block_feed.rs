use ethers::providers::{Middleware, Provider, Ws};
use futures_util::StreamExt;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info_span, warn};
use tracing_futures::Instrument;
use url::Url;

use surge_core::{BlockFeed, ChainCommunicationError, ChainResult};

/// Subscribe to new blocks over a WebSocket endpoint and publish every block
/// number into `feed`.
///
/// Returns once the subscription is established. The forwarding task ends
/// when the endpoint closes the subscription, after which confirmations only
/// poll.
pub async fn connect_block_feed(url: &Url, feed: BlockFeed) -> ChainResult<JoinHandle<()>> {
    let provider = Provider::<Ws>::connect(url.as_str())
        .await
        .map_err(|err| ChainCommunicationError::connection(url, err))?;

    let (ready_tx, ready_rx) = oneshot::channel();
    let span = info_span!("block_feed", %url);
    let handle = tokio::spawn(
        async move {
            let mut blocks = match provider.subscribe_blocks().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            while let Some(block) = blocks.next().await {
                if let Some(number) = block.number {
                    let receivers = feed.publish(number.as_u64());
                    debug!(block = number.as_u64(), receivers, "New block");
                }
            }
            warn!("Block subscription ended, confirmations fall back to polling");
        }
        .instrument(span),
    );

    match ready_rx.await {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(err)) => Err(ChainCommunicationError::connection(url, err)),
        Err(_) => Err(ChainCommunicationError::from_other_str(format!(
            "Block subscription task for {url} exited early"
        ))),
    }
}
