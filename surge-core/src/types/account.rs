use std::fmt::{Debug, Formatter};

use ethers_core::types::Address;
use ethers_signers::{LocalWallet, Signer};

/// A signer account derived from a seed phrase.
///
/// The signing key never leaves this struct: `Debug` only prints the address
/// and the derivation path, and nothing in the storage layer accepts an
/// `Account` directly.
#[derive(Clone)]
pub struct Account {
    address: Address,
    signer: LocalWallet,
    derivation_path: String,
}

impl Account {
    /// Wrap a wallet derived on `derivation_path`
    pub fn new(signer: LocalWallet, derivation_path: impl Into<String>) -> Self {
        Self {
            address: signer.address(),
            signer,
            derivation_path: derivation_path.into(),
        }
    }

    /// The account address
    pub fn address(&self) -> Address {
        self.address
    }

    /// The wallet used to sign transfers for this account
    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }

    /// The HD path this account was derived on
    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    /// An account with a freshly generated key, for tests
    #[cfg(any(test, feature = "test-utils"))]
    pub fn random() -> Self {
        let signer = LocalWallet::new(&mut ethers_core::rand::thread_rng());
        Self::new(signer, "m/44'/60'/0'/0/0")
    }
}

impl Debug for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_omits_the_key() {
        let account = Account::random();
        let out = format!("{account:?}");
        assert!(out.contains("address"));
        assert!(!out.contains("signer"));
    }
}
