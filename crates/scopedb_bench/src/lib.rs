//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use scopedb_codec::Value;
use scopedb_core::journal::{JournalManager, JournalRecord};
use scopedb_core::{Key, SequenceNumber, TransactionId};

/// Generate random text of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a random value of roughly `size` bytes.
pub fn random_value(size: usize) -> Value {
    let mut rng = rand::thread_rng();
    match rng.gen_range(0..3) {
        0 => Value::Integer(rng.gen()),
        1 => Value::Text(random_text(size)),
        _ => Value::Bytes((0..size).map(|_| rng.gen()).collect()),
    }
}

/// Generate `count` distinct keys with random values.
pub fn generate_rows(count: usize, value_size: usize) -> Vec<(String, Value)> {
    (0..count)
        .map(|i| (format!("{i:08}"), random_value(value_size)))
        .collect()
}

/// Encode a journal of `commits` root commits of `rows_per_commit` rows
/// each, spread over four tables.
pub fn journal_bytes(commits: usize, rows_per_commit: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for commit in 0..commits {
        let txid = TransactionId::new(commit as u64 + 1);
        let mut records = vec![JournalRecord::Begin { txid }];
        records.extend(
            generate_rows(rows_per_commit, 64)
                .into_iter()
                .map(|(key, value)| JournalRecord::Put {
                    txid,
                    key: Key::new(format!("table_{}", commit % 4), key),
                    value,
                }),
        );
        records.push(JournalRecord::Commit {
            txid,
            sequence: SequenceNumber::new(commit as u64 + 1),
        });
        for record in &records {
            bytes.extend(JournalManager::encode_frame(record).unwrap());
        }
    }
    bytes
}
