//! Verify command implementation.

use super::open_journal;
use scopedb_core::journal::{JournalManager, JournalRecord};
use scopedb_core::TransactionId;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records read.
    pub records_checked: usize,
    /// Transactions with a `COMMIT` record.
    pub committed: usize,
    /// Transaction left open at the end of the journal.
    pub incomplete: Option<TransactionId>,
    /// Bytes after the last whole record.
    pub torn_bytes: u64,
    /// Errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying database at {}", path.display());
    println!();

    let journal = open_journal(path)?;
    let result = verify_journal(&journal)?;

    println!("Journal:");
    println!("  Records checked: {}", result.records_checked);
    println!("  Committed:       {}", result.committed);
    if let Some(txid) = result.incomplete {
        println!("  Incomplete:      {txid} (dropped on open)");
    }
    if result.torn_bytes > 0 {
        println!("  Torn tail:       {} bytes (cut off on open)", result.torn_bytes);
    }
    for error in &result.errors {
        println!("  Error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Database verification passed");
        Ok(())
    } else {
        println!("✗ Database verification failed");
        Err("Verification failed".into())
    }
}

/// Walks the journal, checking record integrity and transaction framing.
///
/// A torn tail or a trailing transaction without `COMMIT` is what a crash
/// leaves behind and is reported without failing.
pub fn verify_journal(journal: &JournalManager) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let size = journal.size()?;
    let mut result = VerifyResult::default();
    let mut open: Option<TransactionId> = None;

    let mut iter = journal.iter()?;
    for item in iter.by_ref() {
        let (offset, record) = match item {
            Ok(entry) => entry,
            Err(error) => {
                result.errors.push(error.to_string());
                break;
            }
        };
        result.records_checked += 1;

        match (&record, open) {
            (JournalRecord::Begin { txid }, None) => open = Some(*txid),
            (JournalRecord::Begin { txid }, Some(current)) => {
                result
                    .errors
                    .push(format!("{txid} begins at offset {offset} inside {current}"));
                open = Some(*txid);
            }
            (JournalRecord::Commit { txid, .. }, Some(current)) if *txid == current => {
                result.committed += 1;
                open = None;
            }
            (
                JournalRecord::Put { txid, .. } | JournalRecord::Delete { txid, .. },
                Some(current),
            ) if *txid == current => {}
            (JournalRecord::Checkpoint { .. }, None) => {}
            (other, current) => {
                result.errors.push(format!(
                    "unexpected {} at offset {offset} (open transaction: {})",
                    other.record_type().name(),
                    current.map_or_else(|| "none".to_string(), |txid| txid.to_string()),
                ));
            }
        }
    }

    if result.is_ok() {
        result.torn_bytes = size.saturating_sub(iter.valid_end());
        result.incomplete = open;
    }
    Ok(result)
}
