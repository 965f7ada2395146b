//! Transaction manager.

use crate::error::CoreResult;
use crate::journal::{JournalManager, JournalRecord};
use crate::store::CommittedStore;
use crate::transaction::{PendingWrite, WriteSet};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Makes root commits durable.
///
/// Root commits are serialised by a single write lock. Within it a commit:
/// 1. appends `BEGIN`, one `PUT`/`DELETE` per key and `COMMIT` as one batch
/// 2. flushes (and syncs if configured) the journal
/// 3. applies the writes to the committed store
/// 4. publishes the new committed sequence
///
/// Ids and sequences are only consumed by commits that reach the journal.
pub struct TransactionManager {
    journal: Arc<JournalManager>,
    store: Arc<CommittedStore>,
    next_txid: AtomicU64,
    next_seq: AtomicU64,
    committed_seq: AtomicU64,
    write_lock: Mutex<()>,
}

impl TransactionManager {
    /// Creates a manager for an empty database.
    pub(crate) fn new(journal: Arc<JournalManager>, store: Arc<CommittedStore>) -> Self {
        Self::with_state(journal, store, 1, 1, 0)
    }

    /// Creates a manager initialised from recovery.
    pub(crate) fn with_state(
        journal: Arc<JournalManager>,
        store: Arc<CommittedStore>,
        next_txid: u64,
        next_seq: u64,
        committed_seq: u64,
    ) -> Self {
        Self {
            journal,
            store,
            next_txid: AtomicU64::new(next_txid),
            next_seq: AtomicU64::new(next_seq),
            committed_seq: AtomicU64::new(committed_seq),
            write_lock: Mutex::new(()),
        }
    }

    /// Commits a root write set.
    ///
    /// Returns `None` without touching the journal when `writes` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal append fails. The committed store is
    /// left unchanged and any partial append is cut off.
    pub fn commit(&self, writes: &WriteSet) -> CoreResult<Option<SequenceNumber>> {
        if writes.is_empty() {
            return Ok(None);
        }

        let _guard = self.write_lock.lock();
        let txid = TransactionId::new(self.next_txid.load(Ordering::SeqCst));
        let sequence = SequenceNumber::new(self.next_seq.load(Ordering::SeqCst));

        let mut records = Vec::with_capacity(writes.len() + 2);
        records.push(JournalRecord::Begin { txid });
        records.extend(writes.iter().map(|(key, write)| match write {
            PendingWrite::Put(value) => JournalRecord::Put {
                txid,
                key: key.clone(),
                value: value.clone(),
            },
            PendingWrite::Delete => JournalRecord::Delete {
                txid,
                key: key.clone(),
            },
        }));
        records.push(JournalRecord::Commit { txid, sequence });

        let start = self.journal.size()?;
        if let Err(err) = self.journal.append_batch(&records) {
            if let Err(cleanup) = self.journal.truncate(start) {
                tracing::warn!(%txid, error = %cleanup, "could not cut off failed commit");
            }
            return Err(err);
        }

        self.store.apply(writes);
        self.next_txid.fetch_add(1, Ordering::SeqCst);
        self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);

        tracing::debug!(%txid, %sequence, writes = writes.len(), "root commit");
        Ok(Some(sequence))
    }

    /// Rewrites the journal as one checkpoint transaction holding the
    /// committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if rewriting the journal fails.
    pub fn compact(&self) -> CoreResult<CompactStats> {
        let _guard = self.write_lock.lock();
        let before = self.journal.size()?;
        let sequence = self.committed_seq();
        let snapshot = self.store.snapshot();

        let snapshot_empty = snapshot.is_empty();
        let mut records = vec![JournalRecord::Checkpoint { sequence }];
        if !snapshot_empty {
            let txid = TransactionId::new(self.next_txid.load(Ordering::SeqCst));
            records.push(JournalRecord::Begin { txid });
            for (key, write) in snapshot {
                if let PendingWrite::Put(value) = write {
                    records.push(JournalRecord::Put { txid, key, value });
                }
            }
            records.push(JournalRecord::Commit { txid, sequence });
        }

        self.journal.replace(&records)?;
        if !snapshot_empty {
            self.next_txid.fetch_add(1, Ordering::SeqCst);
        }
        let after = self.journal.size()?;
        tracing::info!(%sequence, before, after, "journal compacted");
        Ok(CompactStats {
            bytes_before: before,
            bytes_after: after,
        })
    }

    /// Returns the sequence of the latest root commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Returns the id the next root commit will use.
    #[must_use]
    pub fn next_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.load(Ordering::SeqCst))
    }

    /// Returns the journal.
    #[must_use]
    pub fn journal(&self) -> &Arc<JournalManager> {
        &self.journal
    }

    pub(crate) fn store(&self) -> &Arc<CommittedStore> {
        &self.store
    }
}

/// Result of [`TransactionManager::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    /// Journal size before compaction.
    pub bytes_before: u64,
    /// Journal size after compaction.
    pub bytes_after: u64,
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("next_txid", &self.next_txid())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;
    use scopedb_codec::Value;
    use scopedb_storage::InMemoryBackend;

    fn create_manager() -> TransactionManager {
        let journal = Arc::new(JournalManager::new(Box::new(InMemoryBackend::new()), false));
        TransactionManager::new(journal, Arc::new(CommittedStore::new()))
    }

    fn one_put(table: &str, key: &str, value: i64) -> WriteSet {
        let mut writes = WriteSet::new();
        writes.insert(Key::new(table, key), PendingWrite::Put(Value::Integer(value)));
        writes
    }

    #[test]
    fn empty_commit_writes_nothing() {
        let tm = create_manager();
        assert_eq!(tm.commit(&WriteSet::new()).unwrap(), None);
        assert_eq!(tm.journal().size().unwrap(), 0);
        assert_eq!(tm.committed_seq(), SequenceNumber::new(0));
    }

    #[test]
    fn commit_journals_and_applies() {
        let tm = create_manager();
        let seq = tm.commit(&one_put("t", "k", 7)).unwrap();
        assert_eq!(seq, Some(SequenceNumber::new(1)));
        assert_eq!(tm.store().get(&Key::new("t", "k")), Some(Value::Integer(7)));

        let records: Vec<_> = tm
            .journal()
            .read_all()
            .unwrap()
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        let txid = TransactionId::new(1);
        assert_eq!(
            records,
            vec![
                JournalRecord::Begin { txid },
                JournalRecord::Put {
                    txid,
                    key: Key::new("t", "k"),
                    value: Value::Integer(7)
                },
                JournalRecord::Commit {
                    txid,
                    sequence: SequenceNumber::new(1)
                },
            ]
        );
    }

    #[test]
    fn sequence_numbers_increase() {
        let tm = create_manager();
        let a = tm.commit(&one_put("t", "a", 1)).unwrap().unwrap();
        let b = tm.commit(&one_put("t", "b", 2)).unwrap().unwrap();
        assert!(b > a);
        assert_eq!(tm.committed_seq(), b);
        assert_eq!(tm.next_txid(), TransactionId::new(3));
    }

    #[test]
    fn compact_keeps_only_live_state() {
        let tm = create_manager();
        tm.commit(&one_put("t", "a", 1)).unwrap();
        tm.commit(&one_put("t", "a", 2)).unwrap();
        let mut delete = WriteSet::new();
        delete.insert(Key::new("t", "b"), PendingWrite::Delete);
        tm.commit(&delete).unwrap();

        let stats = tm.compact().unwrap();
        assert!(stats.bytes_after < stats.bytes_before);

        let records = tm.journal().read_all().unwrap();
        let puts = records
            .iter()
            .filter(|(_, r)| matches!(r, JournalRecord::Put { .. }))
            .count();
        assert_eq!(puts, 1);
        assert!(matches!(
            records[0].1,
            JournalRecord::Checkpoint { sequence } if sequence == SequenceNumber::new(3)
        ));
    }

    #[test]
    fn compact_empty_store_writes_checkpoint_only() {
        let tm = create_manager();
        tm.compact().unwrap();
        assert_eq!(tm.journal().read_all().unwrap().len(), 1);
    }
}
