//! Write sets and the transaction manager.
//!
//! Every scope on a connection buffers its writes in a [`WriteSet`]. Nested
//! commits merge a child's set into its parent's; a root commit hands its
//! set to the [`TransactionManager`], which journals it and applies it to
//! the committed store.

mod manager;

pub use manager::{CompactStats, TransactionManager};

use crate::types::Key;
use scopedb_codec::Value;
use std::collections::BTreeMap;

/// A buffered change to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Store this value.
    Put(Value),
    /// Remove the key.
    Delete,
}

impl PendingWrite {
    /// Returns the value this write leaves visible, `None` for a delete.
    #[must_use]
    pub fn visible_value(&self) -> Option<&Value> {
        match self {
            Self::Put(value) => Some(value),
            Self::Delete => None,
        }
    }
}

/// Buffered writes of one scope, ordered by key.
///
/// Ordering makes journal output deterministic.
pub type WriteSet = BTreeMap<Key, PendingWrite>;

/// Merges `child` into `parent`; the child's write to a key wins.
pub fn merge_into(parent: &mut WriteSet, child: WriteSet) {
    parent.extend(child);
}
