//! Inspect command implementation.

use scopedb_core::{Config, Database};
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Journal records replayed on open.
    pub journal_records: usize,
    /// Transactions replayed on open.
    pub committed_transactions: usize,
    /// Sequence of the last committed transaction.
    pub committed_seq: u64,
    /// Per-table statistics.
    pub tables: Vec<TableInfo>,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Number of live keys.
    pub keys: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Opens the database at `path` and collects its statistics.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let db = Database::open_with_config(path, Config::default().create_if_missing(false))?;
    let recovery = db.recovery_stats();

    let result = InspectResult {
        path: path.display().to_string(),
        journal_size: db.journal_size()?,
        journal_records: recovery.records,
        committed_transactions: recovery.committed,
        committed_seq: db.committed_seq().as_u64(),
        tables: db
            .tables()?
            .into_iter()
            .map(|table| TableInfo {
                name: table.name,
                keys: table.keys,
            })
            .collect(),
    };
    db.close()?;
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Database: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:          {} bytes", result.journal_size);
    println!("  Records:       {}", result.journal_records);
    println!("  Transactions:  {}", result.committed_transactions);
    println!("  Committed seq: {}", result.committed_seq);
    println!();
    println!("Tables ({}):", result.tables.len());
    for table in &result.tables {
        println!("  {:24} {} key(s)", table.name, table.keys);
    }
}
