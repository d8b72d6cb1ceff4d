//! Settings for the surge agents
//!
//! ### Configuration
//!
//! Agents read settings from built-in defaults, then from config files, and
//! finally from the environment.
//!
//! ### Configuration value precedence
//!
//! Configuration key/value pairs are loaded in the following order, with later
//! sources taking precedence:
//!
//! 1. Built-in defaults.
//! 2. Every `./config/*.json` file, in name order.
//! 3. The files listed in `CONFIG_FILES` (comma separated), followed by any
//!    file passed on the command line, each overwriting previous ones.
//! 4. Environment variables prefixed with `SURGE_`. Nested keys are separated
//!    by a double underscore, e.g. `SURGE_TRACING__LEVEL=debug`.
//!
//! A `.env` file in the working directory is loaded into the environment
//! before any of the above is read.

use std::{path::PathBuf, str::FromStr, time::Duration};

use eyre::{eyre, Context, Result};
use serde::Deserialize;
use surge_core::{Address, U256};
use url::Url;

pub use loader::*;
pub use trace::*;

mod loader;
mod trace;

/// Settings as they appear in config files and the environment, before
/// validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    rpc_url: String,
    ws_url: Option<String>,
    db: String,
    mnemonic: Option<String>,
    mnemonic_file: String,
    wallet_count: usize,
    tx_per_wallet: usize,
    value_wei: String,
    to_address: String,
    run_duration_minutes: u64,
    receipt_workers: usize,
    receipt_timeout_secs: u64,
    drain_grace_secs: u64,
    metrics_port: Option<u16>,
    tracing: TracingConfig,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".into(),
            ws_url: None,
            db: "sqlite://./transactions.db?mode=rwc".into(),
            mnemonic: None,
            mnemonic_file: "mnemonic.txt".into(),
            wallet_count: 10,
            tx_per_wallet: 10,
            value_wei: "1000000000000000".into(),
            to_address: "0x0000000000000000000000000000000000000001".into(),
            run_duration_minutes: 0,
            receipt_workers: 10,
            receipt_timeout_secs: 60,
            drain_grace_secs: 60,
            metrics_port: None,
            tracing: TracingConfig::default(),
        }
    }
}

/// Validated settings of the throughput tester.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Ledger endpoint used for every request-response call
    pub rpc_url: Url,
    /// Push channel for new-block notifications, poll-only when absent
    pub ws_url: Option<Url>,
    /// Record store connection string
    pub db: String,
    /// Fixed seed phrase, a fresh one is generated when absent
    pub mnemonic: Option<String>,
    /// Where a generated seed phrase is written
    pub mnemonic_file: PathBuf,
    /// Number of accounts to derive
    pub wallet_count: usize,
    /// Transfers submitted per account per episode
    pub tx_per_wallet: usize,
    /// Amount of every transfer
    pub value: U256,
    /// Recipient of every transfer
    pub to_address: Address,
    /// Total duration of loop mode, zero runs a single episode
    pub run_duration: Duration,
    /// Size of each episode's confirmation worker pool
    pub receipt_workers: usize,
    /// Per-confirmation timeout
    pub receipt_timeout: Duration,
    /// How long to wait for outstanding confirmations before exiting
    pub drain_grace: Duration,
    /// Port of the `/metrics` endpoint, disabled when absent
    pub metrics_port: Option<u16>,
    /// Log output configuration
    pub tracing: TracingConfig,
}

impl Settings {
    /// Whether the tester should repeat episodes until `run_duration` has
    /// elapsed
    pub fn loop_mode(&self) -> bool {
        !self.run_duration.is_zero()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawSettings> for Settings {
    type Error = eyre::Report;

    fn try_from(raw: RawSettings) -> Result<Self> {
        let rpc_url = Url::parse(&raw.rpc_url)
            .with_context(|| format!("Invalid rpc_url `{}`", raw.rpc_url))?;
        let ws_url = non_empty(raw.ws_url)
            .map(|url| Url::parse(&url).with_context(|| format!("Invalid ws_url `{url}`")))
            .transpose()?;
        let value = U256::from_dec_str(&raw.value_wei)
            .map_err(|err| eyre!("Invalid value_wei `{}`: {err}", raw.value_wei))?;
        let to_address = Address::from_str(&raw.to_address)
            .map_err(|err| eyre!("Invalid to_address `{}`: {err}", raw.to_address))?;

        if raw.wallet_count == 0 {
            return Err(eyre!("wallet_count must be at least 1"));
        }
        if raw.tx_per_wallet == 0 {
            return Err(eyre!("tx_per_wallet must be at least 1"));
        }
        if raw.receipt_workers == 0 {
            return Err(eyre!("receipt_workers must be at least 1"));
        }
        if raw.receipt_timeout_secs == 0 {
            return Err(eyre!("receipt_timeout_secs must be at least 1"));
        }

        Ok(Self {
            rpc_url,
            ws_url,
            db: raw.db,
            mnemonic: non_empty(raw.mnemonic).map(|m| m.trim().to_owned()),
            mnemonic_file: PathBuf::from(raw.mnemonic_file),
            wallet_count: raw.wallet_count,
            tx_per_wallet: raw.tx_per_wallet,
            value,
            to_address,
            run_duration: Duration::from_secs(raw.run_duration_minutes.saturating_mul(60)),
            receipt_workers: raw.receipt_workers,
            receipt_timeout: Duration::from_secs(raw.receipt_timeout_secs),
            drain_grace: Duration::from_secs(raw.drain_grace_secs),
            metrics_port: raw.metrics_port,
            tracing: raw.tracing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::try_from(RawSettings::default()).unwrap();
        assert_eq!(settings.rpc_url.as_str(), "http://localhost:8545/");
        assert!(settings.ws_url.is_none());
        assert_eq!(settings.wallet_count, 10);
        assert_eq!(settings.tx_per_wallet, 10);
        assert_eq!(settings.value, U256::exp10(15));
        assert_eq!(settings.to_address, Address::from_low_u64_be(1));
        assert_eq!(settings.receipt_workers, 10);
        assert_eq!(settings.receipt_timeout, Duration::from_secs(60));
        assert!(!settings.loop_mode());
    }

    #[test]
    fn empty_optional_strings_are_absent() {
        let raw = RawSettings {
            ws_url: Some(String::new()),
            mnemonic: Some("  ".into()),
            ..Default::default()
        };
        let settings = Settings::try_from(raw).unwrap();
        assert!(settings.ws_url.is_none());
        assert!(settings.mnemonic.is_none());
    }

    #[test]
    fn duration_minutes_enable_loop_mode() {
        let raw = RawSettings {
            run_duration_minutes: 2,
            ..Default::default()
        };
        let settings = Settings::try_from(raw).unwrap();
        assert!(settings.loop_mode());
        assert_eq!(settings.run_duration, Duration::from_secs(120));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_address = RawSettings {
            to_address: "not-an-address".into(),
            ..Default::default()
        };
        assert!(Settings::try_from(bad_address).is_err());

        let bad_value = RawSettings {
            value_wei: "1.5".into(),
            ..Default::default()
        };
        assert!(Settings::try_from(bad_value).is_err());

        let no_workers = RawSettings {
            receipt_workers: 0,
            ..Default::default()
        };
        let err = Settings::try_from(no_workers).unwrap_err();
        assert!(err.to_string().contains("receipt_workers"));
    }
}
