use std::io::{self, BufRead, Write};

use eyre::{Context, Result};
use tracing::{info, warn};

use surge_base::{settings::Settings, SurgeDb};
use surge_core::{Account, Address, LedgerProvider, U256};
use surge_ethereum::{derive_accounts, generate_mnemonic, save_mnemonic};

/// Derive the configured number of accounts, generating and saving a fresh
/// mnemonic when none is configured
pub fn load_accounts(settings: &Settings) -> Result<Vec<Account>> {
    let phrase = match &settings.mnemonic {
        Some(phrase) => {
            info!("Using configured mnemonic");
            phrase.clone()
        }
        None => {
            info!("No mnemonic configured, generating a new one");
            let phrase = generate_mnemonic()?;
            save_mnemonic(&settings.mnemonic_file, &phrase)?;
            phrase
        }
    };
    let accounts = derive_accounts(&phrase, settings.wallet_count)
        .context("Failed to derive accounts from mnemonic")?;
    info!(count = accounts.len(), "Derived accounts");
    Ok(accounts)
}

/// Record every account in the wallet registry. Already registered
/// addresses are reported and skipped.
pub async fn register_wallets(db: &SurgeDb, accounts: &[Account]) -> Result<()> {
    for account in accounts {
        let inserted = db
            .insert_wallet(account.address(), account.derivation_path())
            .await?;
        if !inserted {
            warn!(address = ?account.address(), "Wallet already registered");
        }
    }
    Ok(())
}

/// Balance of one account, or the error that prevented reading it
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntry {
    pub address: Address,
    pub balance: Result<U256, String>,
}

impl BalanceEntry {
    /// Whether this account can pay for transfers
    pub fn is_funded(&self) -> bool {
        matches!(&self.balance, Ok(balance) if !balance.is_zero())
    }
}

/// Query the balance of every account
pub async fn check_balances(
    provider: &dyn LedgerProvider,
    accounts: &[Account],
) -> Vec<BalanceEntry> {
    let mut entries = Vec::with_capacity(accounts.len());
    for account in accounts {
        let balance = provider
            .get_balance(account.address())
            .await
            .map_err(|err| err.to_string());
        entries.push(BalanceEntry {
            address: account.address(),
            balance,
        });
    }
    entries
}

/// `y` and `yes`, in any case, confirm
pub fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask the operator whether to go on. Blocks on stdin.
pub async fn ask_to_proceed() -> Result<bool> {
    tokio::task::spawn_blocking(|| -> Result<bool> {
        print!("Do you want to proceed with sending transactions? (y/n): ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_confirmation(&answer))
    })
    .await
    .context("Prompt task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_yes_confirms() {
        assert!(is_confirmation("y\n"));
        assert!(is_confirmation("  YES "));
        assert!(!is_confirmation("n"));
        assert!(!is_confirmation(""));
        assert!(!is_confirmation("yeah"));
    }

    #[test]
    fn test_zero_balance_and_errors_are_unfunded() {
        let address = Address::from_low_u64_be(1);
        let entry = |balance| BalanceEntry { address, balance };
        assert!(entry(Ok(U256::one())).is_funded());
        assert!(!entry(Ok(U256::zero())).is_funded());
        assert!(!entry(Err("connection refused".into())).is_funded());
    }
}
