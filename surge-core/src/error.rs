use std::any::Any;
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// The result of interacting with a ledger endpoint.
pub type ChainResult<T> = Result<T, ChainCommunicationError>;

/// An "Any"-typed error.
pub trait SurgeCustomError: StdError + Send + Sync + Any {}

impl<E: StdError + Send + Sync + Any> SurgeCustomError for E {}

/// Thin wrapper around a boxed SurgeCustomError. Basically a trait-object
/// adaptor.
#[repr(transparent)]
pub struct SurgeCustomErrorWrapper(Box<dyn SurgeCustomError>);

impl Debug for SurgeCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", AsRef::<dyn SurgeCustomError>::as_ref(&self))
    }
}

impl Display for SurgeCustomErrorWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", AsRef::<dyn SurgeCustomError>::as_ref(&self))
    }
}

impl StdError for SurgeCustomErrorWrapper {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl AsRef<dyn SurgeCustomError> for SurgeCustomErrorWrapper {
    fn as_ref(&self) -> &dyn SurgeCustomError {
        self.0.as_ref()
    }
}

impl Deref for SurgeCustomErrorWrapper {
    type Target = Box<dyn SurgeCustomError>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// ChainCommunicationError contains errors returned when attempting to
/// query a ledger endpoint or hand it a transfer
#[derive(Debug, thiserror::Error)]
pub enum ChainCommunicationError {
    /// The endpoint answered with an error, or could not be reached
    #[error(transparent)]
    Rpc(SurgeCustomErrorWrapper),
    /// A transfer could not be signed locally
    #[error("Failed to sign transfer: {0}")]
    Signing(SurgeCustomErrorWrapper),
    /// A connection to the endpoint could not be established
    #[error("Failed to connect to {url}: {source}")]
    Connection {
        /// Endpoint that was dialed
        url: String,
        /// Underlying failure
        source: SurgeCustomErrorWrapper,
    },
    /// Any other error, carried as text
    #[error("{0}")]
    CustomError(String),
}

impl ChainCommunicationError {
    /// Create a chain communication error from an endpoint error
    pub fn from_rpc<E: SurgeCustomError>(err: E) -> Self {
        Self::Rpc(SurgeCustomErrorWrapper(Box::new(err)))
    }

    /// Create a chain communication error from a signing error
    pub fn from_signing<E: SurgeCustomError>(err: E) -> Self {
        Self::Signing(SurgeCustomErrorWrapper(Box::new(err)))
    }

    /// Create a connection error for the given endpoint
    pub fn connection<E: SurgeCustomError>(url: impl ToString, err: E) -> Self {
        Self::Connection {
            url: url.to_string(),
            source: SurgeCustomErrorWrapper(Box::new(err)),
        }
    }

    /// Creates a chain communication error from a string
    pub fn from_other_str(err: impl Into<String>) -> Self {
        Self::CustomError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("nonce too low")]
    struct NonceTooLow;

    #[test]
    fn rpc_errors_display_transparently() {
        let err = ChainCommunicationError::from_rpc(NonceTooLow);
        assert_eq!(err.to_string(), "nonce too low");
    }

    #[test]
    fn connection_errors_name_the_endpoint() {
        let err = ChainCommunicationError::connection("http://localhost:8545", NonceTooLow);
        assert_eq!(
            err.to_string(),
            "Failed to connect to http://localhost:8545: nonce too low"
        );
    }
}
