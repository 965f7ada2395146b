//! The per-connection stack of savepoint scopes.
//!
//! Scope `0` belongs to the root cursor, scope `n` to the cursor nested `n`
//! levels below it. A cursor remembers its depth and savepoint id; if the
//! scope at that depth carries another id (or is gone), the cursor has been
//! detached and every lookup fails.

use crate::error::{CoreError, CoreResult};
use crate::transaction::{merge_into, PendingWrite, WriteSet};
use crate::types::{Key, SavepointId};
use scopedb_codec::Value;
use std::collections::BTreeMap;

#[derive(Debug)]
struct Scope {
    savepoint: SavepointId,
    writes: WriteSet,
}

/// Savepoint scopes of one connection, innermost last.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    scopes: Vec<Scope>,
    next_savepoint: u64,
    max_depth: usize,
}

impl ScopeStack {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            scopes: Vec::new(),
            next_savepoint: 1,
            max_depth,
        }
    }

    /// Opens a scope on top and returns its depth and savepoint.
    pub(crate) fn push(&mut self) -> CoreResult<(usize, SavepointId)> {
        if self.scopes.len() >= self.max_depth {
            return Err(CoreError::resource(format!(
                "savepoint limit reached ({} nested scopes)",
                self.max_depth
            )));
        }
        let savepoint = SavepointId::new(self.next_savepoint);
        self.next_savepoint += 1;
        self.scopes.push(Scope {
            savepoint,
            writes: WriteSet::new(),
        });
        Ok((self.scopes.len() - 1, savepoint))
    }

    /// Checks that `savepoint` still owns the scope at `depth`.
    pub(crate) fn locate(&self, depth: usize, savepoint: SavepointId) -> CoreResult<()> {
        match self.scopes.get(depth) {
            Some(scope) if scope.savepoint == savepoint => Ok(()),
            _ => Err(CoreError::state(format!(
                "savepoint {savepoint} no longer exists"
            ))),
        }
    }

    pub(crate) fn has_children(&self, depth: usize) -> bool {
        self.scopes.len() > depth + 1
    }

    pub(crate) fn write(&mut self, depth: usize, key: Key, write: PendingWrite) {
        if let Some(scope) = self.scopes.get_mut(depth) {
            scope.writes.insert(key, write);
        }
    }

    /// Looks `key` up in scopes `depth..=0`, innermost first.
    ///
    /// `None` means no scope touched the key and the committed value
    /// applies.
    pub(crate) fn read(&self, depth: usize, key: &Key) -> Option<&PendingWrite> {
        self.scopes
            .iter()
            .take(depth + 1)
            .rev()
            .find_map(|scope| scope.writes.get(key))
    }

    /// Overlays scopes `0..=depth` of `table` on the committed rows.
    pub(crate) fn scan(
        &self,
        depth: usize,
        table: &str,
        committed: Vec<(String, Value)>,
    ) -> Vec<(String, Value)> {
        let mut rows: BTreeMap<String, Value> = committed.into_iter().collect();
        for scope in self.scopes.iter().take(depth + 1) {
            for (key, write) in scope.writes.iter().filter(|(k, _)| k.table == table) {
                match write {
                    PendingWrite::Put(value) => {
                        rows.insert(key.key.clone(), value.clone());
                    }
                    PendingWrite::Delete => {
                        rows.remove(&key.key);
                    }
                }
            }
        }
        rows.into_iter().collect()
    }

    pub(crate) fn writes(&self, depth: usize) -> Option<&WriteSet> {
        self.scopes.get(depth).map(|scope| &scope.writes)
    }

    /// Moves the writes at `depth` into the scope below it.
    pub(crate) fn release(&mut self, depth: usize) {
        if depth == 0 || depth >= self.scopes.len() {
            return;
        }
        let writes = std::mem::take(&mut self.scopes[depth].writes);
        merge_into(&mut self.scopes[depth - 1].writes, writes);
    }

    /// Drops the writes at `depth`, keeping the scope.
    pub(crate) fn discard(&mut self, depth: usize) {
        if let Some(scope) = self.scopes.get_mut(depth) {
            scope.writes.clear();
        }
    }

    /// Removes the topmost scope if it sits at `depth`.
    pub(crate) fn pop(&mut self, depth: usize) {
        if depth + 1 == self.scopes.len() {
            self.scopes.pop();
        }
    }

    /// Removes every scope at or above `depth`.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(value: i64) -> PendingWrite {
        PendingWrite::Put(Value::Integer(value))
    }

    #[test]
    fn push_allocates_fresh_savepoints() {
        let mut stack = ScopeStack::new(4);
        let (d0, sp0) = stack.push().unwrap();
        let (d1, sp1) = stack.push().unwrap();
        assert_eq!((d0, d1), (0, 1));
        assert_ne!(sp0, sp1);

        stack.pop(1);
        let (d1b, sp1b) = stack.push().unwrap();
        assert_eq!(d1b, 1);
        assert_ne!(sp1b, sp1);
        assert!(stack.locate(1, sp1).unwrap_err().is_state());
        assert!(stack.locate(1, sp1b).is_ok());
    }

    #[test]
    fn push_beyond_limit_is_resource_error() {
        let mut stack = ScopeStack::new(2);
        stack.push().unwrap();
        stack.push().unwrap();
        assert!(stack.push().unwrap_err().is_resource());
    }

    #[test]
    fn reads_see_own_and_outer_scopes_only() {
        let mut stack = ScopeStack::new(4);
        stack.push().unwrap();
        stack.push().unwrap();
        let key = Key::new("t", "k");

        stack.write(1, key.clone(), put(2));
        assert_eq!(stack.read(0, &key), None);
        assert_eq!(stack.read(1, &key), Some(&put(2)));

        stack.write(0, key.clone(), put(1));
        assert_eq!(stack.read(0, &key), Some(&put(1)));
        assert_eq!(stack.read(1, &key), Some(&put(2)));
    }

    #[test]
    fn release_merges_into_parent() {
        let mut stack = ScopeStack::new(4);
        stack.push().unwrap();
        stack.push().unwrap();
        let key = Key::new("t", "k");
        stack.write(1, key.clone(), PendingWrite::Delete);
        stack.release(1);
        assert_eq!(stack.read(0, &key), Some(&PendingWrite::Delete));
        assert!(stack.writes(1).unwrap().is_empty());
    }

    #[test]
    fn scan_overlays_scopes() {
        let mut stack = ScopeStack::new(4);
        stack.push().unwrap();
        stack.push().unwrap();
        stack.write(0, Key::new("t", "b"), put(20));
        stack.write(1, Key::new("t", "a"), PendingWrite::Delete);
        stack.write(1, Key::new("other", "z"), put(0));

        let committed = vec![("a".to_string(), Value::Integer(1))];
        let rows = stack.scan(1, "t", committed.clone());
        assert_eq!(rows, vec![("b".to_string(), Value::Integer(20))]);

        let rows = stack.scan(0, "t", committed);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn truncate_detaches_children() {
        let mut stack = ScopeStack::new(4);
        stack.push().unwrap();
        let (_, child) = stack.push().unwrap();
        assert!(stack.has_children(0));
        stack.truncate(1);
        assert!(!stack.has_children(0));
        assert!(stack.locate(1, child).is_err());
        assert!(stack.writes(0).is_some());
        assert!(stack.writes(1).is_none());
    }
}
