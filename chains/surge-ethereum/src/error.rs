use ethers::providers::ProviderError;
use ethers::signers::WalletError;
use surge_core::ChainCommunicationError;

/// Errors specific to the ethers integration, converted into
/// `ChainCommunicationError` at the trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum EthereumError {
    /// The endpoint reported a sequence number that does not fit in a u64
    #[error("Sequence number {0} does not fit in a u64")]
    SequenceOverflow(ethers::types::U256),
}

impl From<EthereumError> for ChainCommunicationError {
    fn from(value: EthereumError) -> Self {
        ChainCommunicationError::from_rpc(value)
    }
}

pub(crate) fn rpc(err: ProviderError) -> ChainCommunicationError {
    ChainCommunicationError::from_rpc(err)
}

pub(crate) fn signing(err: WalletError) -> ChainCommunicationError {
    ChainCommunicationError::from_signing(err)
}
