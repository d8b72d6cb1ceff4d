use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    providers::{Http, JsonRpcClient, Middleware, Provider},
    types::{transaction::eip2718::TypedTransaction, BlockNumber, TransactionRequest},
};
use tracing::{debug, instrument};
use url::Url;

use surge_core::{
    Address, ChainCommunicationError, ChainResult, LedgerConnector, LedgerProvider, Receipt,
    SignedTransfer, TransferRequest, H256, U256,
};

use crate::error::{rpc, signing, EthereumError};

/// A ledger endpoint reached over JSON-RPC.
///
/// Transfers are signed as legacy EIP-155 transactions with the chain id
/// fetched once at construction.
#[derive(Debug, Clone)]
pub struct EthereumLedger<C = Http> {
    provider: Provider<C>,
    chain_id: u64,
}

impl EthereumLedger<Http> {
    /// Open an HTTP provider and fetch the chain id
    #[instrument(err)]
    pub async fn connect(url: &Url) -> ChainResult<Self> {
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|err| ChainCommunicationError::connection(url, err))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|err| ChainCommunicationError::connection(url, err))?
            .as_u64();
        debug!(chain_id, "Connected to ledger endpoint");
        Ok(Self::new(provider, chain_id))
    }
}

impl<C> EthereumLedger<C>
where
    C: JsonRpcClient + 'static,
{
    /// Wrap an existing provider for a chain with a known id
    pub fn new(provider: Provider<C>, chain_id: u64) -> Self {
        Self { provider, chain_id }
    }

    fn typed_transaction(&self, request: &TransferRequest) -> TypedTransaction {
        TransactionRequest::new()
            .from(request.account.address())
            .to(request.destination)
            .value(request.value)
            .nonce(request.sequence_number)
            .gas(request.fee_limit)
            .gas_price(request.fee_price)
            .chain_id(self.chain_id)
            .into()
    }
}

#[async_trait]
impl<C> LedgerProvider for EthereumLedger<C>
where
    C: JsonRpcClient + 'static,
{
    async fn get_sequence_number(&self, account: Address) -> ChainResult<u64> {
        let count = self
            .provider
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(rpc)?;
        if count > U256::from(u64::MAX) {
            return Err(EthereumError::SequenceOverflow(count).into());
        }
        Ok(count.low_u64())
    }

    async fn get_fee_price(&self) -> ChainResult<U256> {
        self.provider.get_gas_price().await.map_err(rpc)
    }

    async fn get_balance(&self, account: Address) -> ChainResult<U256> {
        self.provider.get_balance(account, None).await.map_err(rpc)
    }

    fn sign_transfer(&self, request: &TransferRequest) -> ChainResult<SignedTransfer> {
        let tx = self.typed_transaction(request);
        let signature = request
            .account
            .signer()
            .sign_transaction_sync(&tx)
            .map_err(signing)?;
        Ok(SignedTransfer {
            hash: tx.hash(&signature),
            raw: tx.rlp_signed(&signature),
            sequence_number: request.sequence_number,
        })
    }

    async fn submit(&self, transfer: &SignedTransfer) -> ChainResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(transfer.raw.clone())
            .await
            .map_err(rpc)?;
        Ok(pending.tx_hash())
    }

    async fn get_receipt(&self, operation_hash: H256) -> ChainResult<Option<Receipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(operation_hash)
            .await
            .map_err(rpc)?;
        Ok(receipt.map(|receipt| Receipt {
            operation_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            // pre-byzantium receipts carry no status, inclusion is all we know
            succeeded: receipt.status.map_or(true, |status| status.as_u64() == 1),
        }))
    }
}

/// Opens one HTTP `EthereumLedger` per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

#[async_trait]
impl LedgerConnector for HttpConnector {
    async fn connect(&self, url: &Url) -> ChainResult<Arc<dyn LedgerProvider>> {
        let ledger = EthereumLedger::connect(url).await?;
        Ok(Arc::new(ledger))
    }
}
