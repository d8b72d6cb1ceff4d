use ethers::utils::format_ether;

use submitter::{EpisodeSummary, LoopSummary};
use surge_base::{BatchStats, FailedRecord, TransactionStats};

use crate::accounts::BalanceEntry;

/// Failed records listed after an episode
pub const FAILED_RECORDS_SHOWN: u64 = 20;

fn rule() -> String {
    "=".repeat(60)
}

pub fn print_balances(entries: &[BalanceEntry]) {
    println!("\n{}", rule());
    println!("WALLET ADDRESSES AND BALANCES");
    println!("{}\n", rule());
    for (index, entry) in entries.iter().enumerate() {
        println!("[{}] {:?}", index + 1, entry.address);
        match &entry.balance {
            Ok(balance) => {
                println!("    Balance: {balance} wei ({} ETH)", format_ether(*balance));
                if balance.is_zero() {
                    println!("    WARNING: wallet has ZERO balance!");
                }
            }
            Err(err) => println!("    Balance: ERROR - {err}"),
        }
    }
    println!("{}", rule());
    if !entries.iter().all(BalanceEntry::is_funded) {
        println!("WARNING: some wallets have zero balance or errors!");
    }
    println!();
}

pub fn print_episode(summary: &EpisodeSummary) {
    println!("\n{}", rule());
    println!("=== Execution Summary ===\n");
    println!("Batch: {}", summary.batch_id);
    println!("Transactions submitted: {}", summary.attempted);
    println!("Accepted: {}", summary.accepted);
    println!("Rejected: {}", summary.rejected);
    if summary.aborted_accounts > 0 {
        println!("Accounts skipped: {}", summary.aborted_accounts);
    }
    println!(
        "Submission time: {:.2} seconds",
        summary.elapsed.as_secs_f64()
    );
    println!("Transactions per second: {:.2}", summary.tps());
    println!("Confirmations continue in the background");
}

pub fn print_loop(summary: &LoopSummary) {
    println!("\n{}", rule());
    println!("=== LOOP MODE COMPLETED ===");
    println!("Total iterations: {}", summary.episodes.len());
    println!(
        "Total duration: {:.2} minutes",
        summary.elapsed.as_secs_f64() / 60.0
    );
    println!("{}", rule());
}

pub fn print_batch(stats: &BatchStats, failed: &[FailedRecord]) {
    println!("\n=== Batch {} ===", stats.batch_id);
    println!(
        "total: {}  success: {}  failed: {}  pending: {}",
        stats.total, stats.successful, stats.failed, stats.pending
    );
    println!("avg latency: {:.2} ms", stats.avg_latency_ms);
    println!(
        "duration: {:.2} s  tps: {:.2}",
        stats.duration_secs, stats.tps
    );
    if failed.is_empty() {
        return;
    }
    println!("\n=== Failed Transactions ===");
    for (index, record) in failed.iter().enumerate() {
        println!("  {}", failed_line(index, record));
    }
    let failed_total = stats.failed;
    if failed_total > failed.len() as u64 {
        println!(
            "  ... and {} more (showing first {})",
            failed_total - failed.len() as u64,
            failed.len()
        );
    }
}

pub fn print_stats(stats: &TransactionStats, db: &str) {
    println!("\n=== Database Statistics ===");
    println!("total_transactions: {}", stats.total);
    println!("successful: {}", stats.successful);
    println!("failed: {}", stats.failed);
    println!("pending: {}", stats.pending);
    println!("avg_latency_ms: {:.2}", stats.avg_latency_ms);
    println!(
        "submission_tps: {:.2} over {:.2} s",
        stats.submission_tps, stats.submission_window_secs
    );
    println!(
        "confirmation_tps: {:.2} over {:.2} s",
        stats.confirmation_tps, stats.confirmation_window_secs
    );
    println!("\nAll data saved to database: {db}");
}

fn failed_line(index: usize, record: &FailedRecord) -> String {
    format!(
        "{}. Wallet {} (nonce {}): {}",
        index + 1,
        short_address(&record.account_address),
        record.sequence_number,
        record.error
    )
}

fn short_address(address: &str) -> String {
    match address.get(..10) {
        Some(prefix) if address.len() > 10 => format!("{prefix}..."),
        _ => address.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_shortened() {
        assert_eq!(
            short_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            "0xf39fd6e5..."
        );
        assert_eq!(short_address("0x1234"), "0x1234");
    }

    #[test]
    fn test_failed_line_is_numbered_from_one() {
        let record = FailedRecord {
            account_address: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".into(),
            sequence_number: 4,
            error: "transaction reverted".into(),
            operation_hash: None,
        };
        assert_eq!(
            failed_line(0, &record),
            "1. Wallet 0x70997970... (nonce 4): transaction reverted"
        );
    }
}
