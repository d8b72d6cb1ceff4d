use std::{fs, path::Path};

use chrono::{SecondsFormat, Utc};
use ethers::{
    core::rand::thread_rng,
    signers::{
        coins_bip39::{English, Mnemonic},
        MnemonicBuilder,
    },
};
use eyre::{Context, Result};
use tracing::info;

use surge_core::{Account, ChainCommunicationError, ChainResult};

/// Standard Ethereum derivation path without the account index.
pub const DERIVATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/";

const MNEMONIC_WORD_COUNT: usize = 12;

/// Generate a fresh 12-word English mnemonic.
pub fn generate_mnemonic() -> ChainResult<String> {
    let mnemonic = Mnemonic::<English>::new_with_count(&mut thread_rng(), MNEMONIC_WORD_COUNT)
        .map_err(ChainCommunicationError::from_signing)?;
    Ok(mnemonic.to_phrase())
}

/// Derive `count` accounts on `m/44'/60'/0'/0/{i}`, `i` starting at zero.
pub fn derive_accounts(phrase: &str, count: usize) -> ChainResult<Vec<Account>> {
    (0..count)
        .map(|index| {
            let path = format!("{DERIVATION_PATH_PREFIX}{index}");
            let wallet = MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .derivation_path(&path)
                .and_then(|builder| builder.build())
                .map_err(ChainCommunicationError::from_signing)?;
            Ok(Account::new(wallet, path))
        })
        .collect()
}

/// Write a generated mnemonic to `path` so the accounts can be recovered.
pub fn save_mnemonic(path: &Path, phrase: &str) -> Result<()> {
    let contents = format!(
        "=== MNEMONIC PHRASE ===\nKEEP THIS SAFE AND PRIVATE!\nGenerated: {}\n\n{phrase}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    fs::write(path, contents).with_context(|| format!("Failed to write mnemonic to {path:?}"))?;
    info!(?path, "Saved mnemonic");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use surge_core::Address;

    use super::*;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn derives_well_known_accounts_in_order() {
        let accounts = derive_accounts(PHRASE, 2).unwrap();
        assert_eq!(
            accounts[0].address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert_eq!(
            accounts[1].address(),
            Address::from_str("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap()
        );
        assert_eq!(accounts[1].derivation_path(), "m/44'/60'/0'/0/1");
    }

    #[test]
    fn generated_mnemonics_have_twelve_words_and_derive() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 12);
        assert_eq!(derive_accounts(&phrase, 3).unwrap().len(), 3);
    }

    #[test]
    fn invalid_phrase_is_rejected() {
        assert!(derive_accounts("not a real mnemonic", 1).is_err());
    }

    #[test]
    fn saved_mnemonic_ends_with_the_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemonic.txt");
        save_mnemonic(&path, PHRASE).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("=== MNEMONIC PHRASE ==="));
        assert_eq!(contents.lines().last(), Some(PHRASE));
    }
}
