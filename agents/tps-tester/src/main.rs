//! The TPS tester submits bursts of transfers from many derived accounts and
//! records how long the ledger takes to confirm them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used, clippy::panic)]

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;

use surge_base::settings::load_settings;

use crate::tester::TpsTester;

mod accounts;
mod report;
mod tester;

/// Agent name used for metrics
pub const AGENT_NAME: &str = "tps_tester";

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Skip the interactive confirmation before submitting
    #[arg(short, long)]
    yes: bool,

    /// Extra JSON config file, applied after `CONFIG_FILES`
    #[arg(short, long = "config", value_name = "FILE")]
    config_files: Vec<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Logging is not initialised at this point, so, using `println!`
    println!("TPS tester starting up...");

    let settings = load_settings(&cli.config_files)?;
    settings.tracing.start_tracing()?;

    let tester = TpsTester::from_settings(settings).await?;
    tester.run(cli.yes).await
}
