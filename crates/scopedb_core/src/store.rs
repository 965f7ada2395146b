//! In-memory materialisation of committed state.

use crate::transaction::{PendingWrite, WriteSet};
use crate::types::Key;
use parking_lot::RwLock;
use scopedb_codec::Value;
use std::collections::BTreeMap;

/// Per-table summary returned by [`crate::Database::tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of live keys.
    pub keys: usize,
}

/// Committed key/value state, rebuilt from the journal on open.
///
/// Tables with no live keys are removed.
#[derive(Default)]
pub(crate) struct CommittedStore {
    tables: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl CommittedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &Key) -> Option<Value> {
        self.tables
            .read()
            .get(&key.table)
            .and_then(|table| table.get(&key.key))
            .cloned()
    }

    /// Returns every `(key, value)` of `table` in key order.
    pub(crate) fn scan(&self, table: &str) -> Vec<(String, Value)> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Applies a committed write set atomically with respect to readers.
    pub(crate) fn apply(&self, writes: &WriteSet) {
        let mut tables = self.tables.write();
        for (key, write) in writes {
            apply_one(&mut tables, key, write);
        }
    }

    /// Applies a single replayed write.
    pub(crate) fn apply_write(&self, key: &Key, write: &PendingWrite) {
        apply_one(&mut self.tables.write(), key, write);
    }

    pub(crate) fn tables(&self) -> Vec<TableStats> {
        self.tables
            .read()
            .iter()
            .map(|(name, rows)| TableStats {
                name: name.clone(),
                keys: rows.len(),
            })
            .collect()
    }

    /// Copies the whole state as a write set of puts.
    pub(crate) fn snapshot(&self) -> WriteSet {
        let tables = self.tables.read();
        let mut writes = WriteSet::new();
        for (table, rows) in tables.iter() {
            for (key, value) in rows {
                writes.insert(Key::new(table.as_str(), key.as_str()), PendingWrite::Put(value.clone()));
            }
        }
        writes
    }
}

fn apply_one(tables: &mut BTreeMap<String, BTreeMap<String, Value>>, key: &Key, write: &PendingWrite) {
    match write {
        PendingWrite::Put(value) => {
            tables
                .entry(key.table.clone())
                .or_default()
                .insert(key.key.clone(), value.clone());
        }
        PendingWrite::Delete => {
            if let Some(rows) = tables.get_mut(&key.table) {
                rows.remove(&key.key);
                if rows.is_empty() {
                    tables.remove(&key.table);
                }
            }
        }
    }
}
