//! Dump-journal command implementation.

use super::open_journal;
use scopedb_core::journal::{JournalManager, JournalRecord};
use serde::Serialize;
use std::path::Path;

/// Journal record representation for output.
#[derive(Debug, Serialize)]
pub struct JournalRecordInfo {
    /// Offset in the journal file.
    pub offset: u64,
    /// Record type.
    pub record_type: String,
    /// Transaction id (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<u64>,
    /// Table (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Key (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Rendered value (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Sequence number (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl JournalRecordInfo {
    fn new(offset: u64, record: &JournalRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: record.record_type().name().to_string(),
            txid: record.txid().map(|txid| txid.as_u64()),
            table: None,
            key: None,
            value: None,
            sequence: None,
        };
        match record {
            JournalRecord::Put { key, value, .. } => {
                info.table = Some(key.table.clone());
                info.key = Some(key.key.clone());
                info.value = Some(value.to_string());
            }
            JournalRecord::Delete { key, .. } => {
                info.table = Some(key.table.clone());
                info.key = Some(key.key.clone());
            }
            JournalRecord::Commit { sequence, .. } | JournalRecord::Checkpoint { sequence } => {
                info.sequence = Some(sequence.as_u64());
            }
            JournalRecord::Begin { .. } => {}
        }
        info
    }
}

/// Runs the dump-journal command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let journal = open_journal(path)?;
    let (records, error) = read_records(&journal, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    match error {
        Some(error) => Err(format!("Journal is corrupt: {error}").into()),
        None => Ok(()),
    }
}

/// Reads up to `limit` records. Records before a corrupt one are returned
/// together with the corruption message.
pub fn read_records(
    journal: &JournalManager,
    limit: Option<usize>,
) -> Result<(Vec<JournalRecordInfo>, Option<String>), Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for item in journal.iter()?.take(max_records) {
        match item {
            Ok((offset, record)) => records.push(JournalRecordInfo::new(offset, &record)),
            Err(error) => return Ok((records, Some(error.to_string()))),
        }
    }

    Ok((records, None))
}

fn print_text_output(records: &[JournalRecordInfo]) {
    println!("Journal Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:10}", record.offset, record.record_type);

        if let Some(txid) = record.txid {
            print!(" txid={txid}");
        }
        if let Some(seq) = record.sequence {
            print!(" seq={seq}");
        }
        if let (Some(table), Some(key)) = (&record.table, &record.key) {
            print!(" {table}/{key}");
        }
        if let Some(ref value) = record.value {
            print!(" = {value}");
        }

        println!();
    }
}
