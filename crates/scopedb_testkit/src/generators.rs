//! Property-based test generators and a reference model of nested scopes.

use proptest::prelude::*;
use scopedb_core::{Cursor, Database, Key, Value};
use std::collections::BTreeMap;

/// Tables used by generated operations.
pub const TABLES: [&str; 3] = ["res_partner", "res_users", "mail_alias"];

/// Strategy for table names.
pub fn table_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(TABLES.to_vec()).prop_map(str::to_string)
}

/// Strategy for keys. The key space is small so operations collide.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-c][0-9]?").expect("Invalid regex")
}

/// Strategy for stored values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        ".{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for hook event names, valid or not.
pub fn event_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("commit".to_string()),
        Just("rollback".to_string()),
        Just("close".to_string()),
        "[a-zA-Z]{0,10}",
    ]
}

/// One step applied to the innermost open cursor.
#[derive(Debug, Clone)]
pub enum ScopeOp {
    /// Write a value.
    Put {
        /// Table.
        table: String,
        /// Key.
        key: String,
        /// Value.
        value: Value,
    },
    /// Remove a key.
    Delete {
        /// Table.
        table: String,
        /// Key.
        key: String,
    },
    /// Open a nested cursor.
    Begin,
    /// Commit and close the innermost cursor.
    Commit,
    /// Roll back and close the innermost cursor.
    Rollback,
    /// Close the innermost cursor without resolving it.
    Close,
}

/// Strategy for a single scope operation.
pub fn scope_op_strategy() -> impl Strategy<Value = ScopeOp> {
    prop_oneof![
        4 => (table_strategy(), key_strategy(), value_strategy())
            .prop_map(|(table, key, value)| ScopeOp::Put { table, key, value }),
        2 => (table_strategy(), key_strategy()).prop_map(|(table, key)| ScopeOp::Delete { table, key }),
        2 => Just(ScopeOp::Begin),
        1 => Just(ScopeOp::Commit),
        1 => Just(ScopeOp::Rollback),
        1 => Just(ScopeOp::Close),
    ]
}

/// Strategy for a sequence of scope operations.
pub fn scope_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<ScopeOp>> {
    prop::collection::vec(scope_op_strategy(), 0..max_len)
}

/// Reference model: committed state plus one write layer per open scope.
#[derive(Debug, Clone)]
pub struct ScopeModel {
    committed: BTreeMap<Key, Value>,
    layers: Vec<BTreeMap<Key, Option<Value>>>,
}

impl Default for ScopeModel {
    fn default() -> Self {
        Self {
            committed: BTreeMap::new(),
            layers: vec![BTreeMap::new()],
        }
    }
}

impl ScopeModel {
    /// Creates a model with an open root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth of the innermost scope.
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    fn top(&mut self) -> &mut BTreeMap<Key, Option<Value>> {
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Applies one operation. `Begin` is ignored at `max_depth`.
    pub fn apply(&mut self, op: &ScopeOp, max_depth: usize) {
        match op {
            ScopeOp::Put { table, key, value } => {
                self.top().insert(Key::new(table.as_str(), key.as_str()), Some(value.clone()));
            }
            ScopeOp::Delete { table, key } => {
                self.top().insert(Key::new(table.as_str(), key.as_str()), None);
            }
            ScopeOp::Begin => {
                if self.layers.len() < max_depth {
                    self.layers.push(BTreeMap::new());
                }
            }
            ScopeOp::Commit => {
                let top = std::mem::take(self.top());
                if self.layers.len() > 1 {
                    self.layers.pop();
                    self.top().extend(top);
                } else {
                    for (key, write) in top {
                        match write {
                            Some(value) => {
                                self.committed.insert(key, value);
                            }
                            None => {
                                self.committed.remove(&key);
                            }
                        }
                    }
                }
            }
            ScopeOp::Rollback | ScopeOp::Close => {
                if self.layers.len() > 1 {
                    self.layers.pop();
                } else {
                    self.top().clear();
                }
            }
        }
    }

    /// Rows of `table` as the innermost scope sees them.
    pub fn visible(&self, table: &str) -> Vec<(String, Value)> {
        let mut rows: BTreeMap<String, Value> = self
            .committed
            .iter()
            .filter(|(k, _)| k.table == table)
            .map(|(k, v)| (k.key.clone(), v.clone()))
            .collect();
        for layer in &self.layers {
            for (key, write) in layer.iter().filter(|(k, _)| k.table == table) {
                match write {
                    Some(value) => {
                        rows.insert(key.key.clone(), value.clone());
                    }
                    None => {
                        rows.remove(&key.key);
                    }
                }
            }
        }
        rows.into_iter().collect()
    }

    /// Committed rows of `table`.
    pub fn committed(&self, table: &str) -> Vec<(String, Value)> {
        self.committed
            .iter()
            .filter(|(k, _)| k.table == table)
            .map(|(k, v)| (k.key.clone(), v.clone()))
            .collect()
    }
}

fn rows_of(cursor: &Cursor, table: &str) -> Result<Vec<(String, Value)>, String> {
    cursor
        .scan(table)
        .map(|rows| rows.into_iter().map(|r| (r.key, r.value)).collect())
        .map_err(|e| e.to_string())
}

/// Applies `ops` to real cursors on `db` and to a [`ScopeModel`], checking
/// after every step that both agree on what the innermost cursor and the
/// committed store hold.
///
/// `max_depth` must match the database's `max_savepoints`.
///
/// # Errors
///
/// Returns a description of the first divergence or unexpected error.
pub fn run_scope_ops(db: &Database, ops: &[ScopeOp], max_depth: usize) -> Result<(), String> {
    let mut model = ScopeModel::new();
    let mut cursors = vec![db.cursor().map_err(|e| e.to_string())?];

    for (step, op) in ops.iter().enumerate() {
        let fail = |e: scopedb_core::CoreError| format!("step {step} {op:?}: {e}");
        let top = cursors.len() - 1;
        match op {
            ScopeOp::Put { table, key, value } => {
                cursors[top].put(table.as_str(), key.as_str(), value.clone()).map_err(fail)?;
            }
            ScopeOp::Delete { table, key } => {
                cursors[top].delete(table.as_str(), key.as_str()).map_err(fail)?;
            }
            ScopeOp::Begin => {
                if cursors.len() < max_depth {
                    let child = cursors[top].begin().map_err(fail)?;
                    cursors.push(child);
                } else if !cursors[top].begin().is_err_and(|e| e.is_resource()) {
                    return Err(format!("step {step}: begin past the limit did not fail"));
                }
            }
            ScopeOp::Commit | ScopeOp::Rollback | ScopeOp::Close => {
                let mut cursor = cursors.pop().ok_or("cursor stack empty")?;
                match op {
                    ScopeOp::Commit => cursor.commit().map_err(fail)?,
                    ScopeOp::Rollback => cursor.rollback().map_err(fail)?,
                    _ => {}
                }
                cursor.close().map_err(fail)?;
                if cursors.is_empty() {
                    cursors.push(db.cursor().map_err(fail)?);
                }
            }
        }
        model.apply(op, max_depth);

        if model.depth() + 1 != cursors.len() {
            return Err(format!("step {step}: depth diverged"));
        }
        let innermost = &cursors[cursors.len() - 1];
        for table in TABLES {
            let actual = rows_of(innermost, table)?;
            let expected = model.visible(table);
            if actual != expected {
                return Err(format!(
                    "step {step} {op:?}: {table} visible {actual:?}, expected {expected:?}"
                ));
            }
            let committed: Vec<_> = db
                .scan(table)
                .map_err(|e| e.to_string())?
                .into_iter()
                .map(|r| (r.key, r.value))
                .collect();
            if committed != model.committed(table) {
                return Err(format!("step {step} {op:?}: {table} committed state diverged"));
            }
        }
    }

    while let Some(mut cursor) = cursors.pop() {
        cursor.close().map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_nested_commit_reaches_parent() {
        let mut model = ScopeModel::new();
        model.apply(&ScopeOp::Begin, 8);
        model.apply(
            &ScopeOp::Put {
                table: "t".into(),
                key: "k".into(),
                value: Value::Integer(1),
            },
            8,
        );
        model.apply(&ScopeOp::Commit, 8);
        assert_eq!(model.depth(), 0);
        assert_eq!(model.visible("t"), vec![("k".to_string(), Value::Integer(1))]);
        assert!(model.committed("t").is_empty());
        model.apply(&ScopeOp::Commit, 8);
        assert_eq!(model.committed("t").len(), 1);
    }

    #[test]
    fn fixed_sequence_matches_model() {
        let db = Database::open_in_memory().unwrap();
        let put = |key: &str, v: i64| ScopeOp::Put {
            table: "res_partner".into(),
            key: key.into(),
            value: Value::Integer(v),
        };
        let ops = vec![
            put("a", 1),
            ScopeOp::Begin,
            put("a", 2),
            ScopeOp::Begin,
            ScopeOp::Delete {
                table: "res_partner".into(),
                key: "a".into(),
            },
            ScopeOp::Rollback,
            ScopeOp::Commit,
            ScopeOp::Commit,
        ];
        run_scope_ops(&db, &ops, 64).unwrap();
        assert_eq!(db.get("res_partner", "a").unwrap(), Some(Value::Integer(2)));
    }

    proptest! {
        #[test]
        fn table_names_are_known(table in table_strategy()) {
            prop_assert!(TABLES.contains(&table.as_str()));
        }
    }
}
