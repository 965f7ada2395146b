//! Database handle and recovery.

use crate::config::Config;
use crate::cursor::{run_guarded, Cursor};
#[cfg(feature = "std")]
use crate::dir::DatabaseDir;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::journal::{JournalManager, JournalRecord};
use crate::query::Row;
use crate::store::{CommittedStore, TableStats};
use crate::transaction::{CompactStats, PendingWrite, TransactionManager};
use crate::types::{Key, SequenceNumber, TransactionId};
use parking_lot::Mutex;
use scopedb_codec::Value;
use scopedb_storage::StorageBackend;
use std::collections::HashMap;
#[cfg(feature = "std")]
use std::path::Path;
use std::sync::Arc;

/// Summary of the journal replay performed on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryStats {
    /// Records read from the journal.
    pub records: usize,
    /// Transactions whose `COMMIT` was found and replayed.
    pub committed: usize,
    /// Transactions without a `COMMIT`, dropped.
    pub incomplete: usize,
    /// Bytes of a torn tail record cut off the journal.
    pub truncated_bytes: u64,
    /// Sequence of the last replayed commit.
    pub committed_seq: SequenceNumber,
}

/// The database handle: the registry that opens cursors.
///
/// A `Database` is passed explicitly to whatever needs cursors; there is no
/// global instance. It can be shared between threads behind an `Arc`.
///
/// # Test mode
///
/// [`enter_test_mode`](Self::enter_test_mode) opens a hidden root cursor.
/// Until [`leave_test_mode`](Self::leave_test_mode), every cursor returned
/// by [`cursor`](Self::cursor) is nested under it: its commits are visible
/// to later cursors but never reach the journal. Only one such cursor may
/// be open at a time.
///
/// ```rust
/// use scopedb_core::{Database, Value};
///
/// let db = Database::open_in_memory()?;
/// db.enter_test_mode()?;
/// db.with_cursor(|cr| cr.put("res_partner", "1", "Foo"))?;
/// let seen = db.with_cursor(|cr| cr.get("res_partner", "1"))?;
/// assert_eq!(seen, Some(Value::from("Foo")));
/// db.leave_test_mode()?;
/// assert_eq!(db.get("res_partner", "1")?, None);
/// # Ok::<(), scopedb_core::CoreError>(())
/// ```
pub struct Database {
    engine: Arc<Engine>,
    #[cfg(feature = "std")]
    dir: Option<DatabaseDir>,
    recovery: RecoveryStats,
    test_root: Mutex<Option<Cursor>>,
}

impl Database {
    /// Opens (or creates) the database in directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseLocked`] if the directory is already open
    /// - journal corruption or checksum errors from recovery
    /// - I/O errors
    #[cfg(feature = "std")]
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the database in directory `path` with `config`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), plus invalid format when
    /// `error_if_exists` is set and the directory already holds data.
    #[cfg(feature = "std")]
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        use scopedb_storage::FileBackend;

        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && !dir.is_new_database() {
            return Err(CoreError::invalid_format(format!(
                "database already exists: {}",
                dir.path().display()
            )));
        }

        let backend = FileBackend::open_with_create_dirs(&dir.journal_path())?;
        let mut db = Self::open_with_backend(config, Box::new(backend))?;
        db.dir = Some(dir);
        Ok(db)
    }

    /// Opens a database over an arbitrary journal backend.
    ///
    /// # Errors
    ///
    /// Returns recovery errors from the journal.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let journal = Arc::new(JournalManager::new(backend, config.sync_on_commit));
        let store = Arc::new(CommittedStore::new());
        let (recovery, next_txid) = recover(&journal, &store)?;

        let manager = Arc::new(TransactionManager::with_state(
            journal,
            store,
            next_txid.as_u64(),
            recovery.committed_seq.as_u64() + 1,
            recovery.committed_seq.as_u64(),
        ));
        tracing::info!(
            records = recovery.records,
            committed = recovery.committed,
            incomplete = recovery.incomplete,
            truncated_bytes = recovery.truncated_bytes,
            committed_seq = %recovery.committed_seq,
            "database opened"
        );

        Ok(Self {
            engine: Arc::new(Engine::new(config, manager)),
            #[cfg(feature = "std")]
            dir: None,
            recovery,
            test_root: Mutex::new(None),
        })
    }

    /// Opens an empty, non-persistent database.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature matches the other openers.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an empty, non-persistent database with `config`.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature matches the other openers.
    pub fn open_in_memory_with_config(config: Config) -> CoreResult<Self> {
        use scopedb_storage::InMemoryBackend;
        Self::open_with_backend(config, Box::new(InMemoryBackend::new()))
    }

    /// Opens a cursor.
    ///
    /// Outside test mode this is a root cursor on a new connection. In test
    /// mode it is nested under the hidden test root.
    ///
    /// # Errors
    ///
    /// - resource error if the database is closed or the connection limit
    ///   is reached
    /// - state error in test mode if another test cursor is still open
    pub fn cursor(&self) -> CoreResult<Cursor> {
        let mut test_root = self.test_root.lock();
        if let Some(root) = test_root.as_mut() {
            return root.begin();
        }
        drop(test_root);
        Cursor::root(self.engine.connect()?)
    }

    /// Runs `f` in a fresh cursor, committing on `Ok` and rolling back on
    /// `Err`. The cursor is closed on every path.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of opening, committing or closing the
    /// cursor.
    pub fn with_cursor<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Cursor) -> Result<T, E>,
        E: From<CoreError>,
    {
        run_guarded(self.cursor()?, f)
    }

    /// Reads the committed value of `table`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`close`](Self::close).
    pub fn get(&self, table: &str, key: &str) -> CoreResult<Option<Value>> {
        self.engine.ensure_open()?;
        Ok(self.engine.store().get(&Key::new(table, key)))
    }

    /// Reads every committed row of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`close`](Self::close).
    pub fn scan(&self, table: &str) -> CoreResult<Vec<Row>> {
        self.engine.ensure_open()?;
        Ok(self
            .engine
            .store()
            .scan(table)
            .into_iter()
            .map(|(key, value)| Row { key, value })
            .collect())
    }

    /// Lists committed tables with their key counts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`close`](Self::close).
    pub fn tables(&self) -> CoreResult<Vec<TableStats>> {
        self.engine.ensure_open()?;
        Ok(self.engine.store().tables())
    }

    /// Sequence of the latest root commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.engine.manager().committed_seq()
    }

    /// What recovery found when the database was opened.
    #[must_use]
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery
    }

    /// Reads every journal record with its offset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] or journal read errors.
    pub fn journal_records(&self) -> CoreResult<Vec<(u64, JournalRecord)>> {
        self.engine.ensure_open()?;
        self.engine.manager().journal().read_all()
    }

    /// Journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] or backend errors.
    pub fn journal_size(&self) -> CoreResult<u64> {
        self.engine.ensure_open()?;
        self.engine.manager().journal().size()
    }

    /// Rewrites the journal to hold only the committed state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] or journal write errors.
    pub fn compact(&self) -> CoreResult<CompactStats> {
        self.engine.ensure_open()?;
        self.engine.manager().compact()
    }

    /// Number of open connections (root cursors, including the test root).
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.engine.connection_count()
    }

    /// Enters test mode.
    ///
    /// # Errors
    ///
    /// - state error if test mode is already active
    /// - resource error if no connection can be opened
    pub fn enter_test_mode(&self) -> CoreResult<()> {
        let mut test_root = self.test_root.lock();
        if test_root.is_some() {
            return Err(CoreError::state("test mode is already active"));
        }
        *test_root = Some(Cursor::root(self.engine.connect()?)?);
        tracing::debug!("entered test mode");
        Ok(())
    }

    /// Leaves test mode, rolling back everything committed under it.
    ///
    /// # Errors
    ///
    /// Returns a state error if test mode is not active or a test cursor is
    /// still open.
    pub fn leave_test_mode(&self) -> CoreResult<()> {
        let mut test_root = self.test_root.lock();
        let Some(root) = test_root.as_mut() else {
            return Err(CoreError::state("test mode is not active"));
        };
        if root.has_open_child()? {
            return Err(CoreError::state(
                "cannot leave test mode while a test cursor is open",
            ));
        }
        if let Some(mut root) = test_root.take() {
            root.rollback()?;
            root.close()?;
        }
        tracing::debug!("left test mode");
        Ok(())
    }

    /// Returns `true` while test mode is active.
    #[must_use]
    pub fn in_test_mode(&self) -> bool {
        self.test_root.lock().is_some()
    }

    /// Closes the database. Test mode is left first.
    ///
    /// Cursors still open can roll back and close but can no longer read,
    /// write or commit. Closing twice does nothing.
    ///
    /// # Errors
    ///
    /// Returns the error of leaving test mode or flushing the journal.
    pub fn close(&self) -> CoreResult<()> {
        if self.in_test_mode() {
            self.leave_test_mode()?;
        }
        if self.engine.shut_down() {
            self.engine.manager().journal().flush()?;
            tracing::info!(committed_seq = %self.committed_seq(), "database closed");
        }
        Ok(())
    }

    /// Returns `true` until [`close`](Self::close).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.engine.config()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close database");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("open", &self.is_open())
            .field("committed_seq", &self.committed_seq())
            .field("test_mode", &self.in_test_mode())
            .finish_non_exhaustive()
    }
}

/// Replays committed transactions into `store`.
///
/// Transactions are applied in the order of their `COMMIT` records. A torn
/// tail is cut off the journal so later appends start on a record boundary.
/// Returns the stats and the next free transaction id.
fn recover(journal: &JournalManager, store: &CommittedStore) -> CoreResult<(RecoveryStats, TransactionId)> {
    let mut stats = RecoveryStats::default();
    let mut pending: HashMap<TransactionId, Vec<(Key, PendingWrite)>> = HashMap::new();
    let mut max_txid = 0u64;

    let size = journal.size()?;
    let valid_end = {
        let mut iter = journal.iter()?;
        for result in iter.by_ref() {
            let (_, record) = result?;
            stats.records += 1;
            if let Some(txid) = record.txid() {
                max_txid = max_txid.max(txid.as_u64());
            }
            match record {
                JournalRecord::Begin { txid } => {
                    pending.insert(txid, Vec::new());
                }
                JournalRecord::Put { txid, key, value } => {
                    if let Some(ops) = pending.get_mut(&txid) {
                        ops.push((key, PendingWrite::Put(value)));
                    }
                }
                JournalRecord::Delete { txid, key } => {
                    if let Some(ops) = pending.get_mut(&txid) {
                        ops.push((key, PendingWrite::Delete));
                    }
                }
                JournalRecord::Commit { txid, sequence } => {
                    if let Some(ops) = pending.remove(&txid) {
                        for (key, write) in &ops {
                            store.apply_write(key, write);
                        }
                        stats.committed += 1;
                    }
                    stats.committed_seq = stats.committed_seq.max(sequence);
                }
                JournalRecord::Checkpoint { sequence } => {
                    stats.committed_seq = stats.committed_seq.max(sequence);
                }
            }
        }
        iter.valid_end()
    };

    stats.incomplete = pending.len();
    if valid_end < size {
        stats.truncated_bytes = size - valid_end;
        tracing::warn!(valid_end, size, "cutting torn record off the journal tail");
        journal.truncate(valid_end)?;
    }
    Ok((stats, TransactionId::new(max_txid + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopedb_storage::InMemoryBackend;

    fn journal_bytes(db: &Database) -> Vec<u8> {
        db.engine
            .manager()
            .journal()
            .with_backend(|b| b.read_all().unwrap())
    }

    fn open_bytes(data: Vec<u8>) -> CoreResult<Database> {
        Database::open_with_backend(Config::default(), Box::new(InMemoryBackend::with_data(data)))
    }

    fn reopen(db: Database) -> Database {
        let data = journal_bytes(&db);
        drop(db);
        open_bytes(data).unwrap()
    }

    #[test]
    fn committed_root_survives_reopen() {
        let db = Database::open_in_memory().unwrap();
        db.with_cursor(|cr| {
            cr.put("res_partner", "1", "Foo")?;
            cr.put("res_partner", "2", 42)?;
            cr.delete("res_partner", "2")
        })
        .unwrap();

        let db = reopen(db);
        assert_eq!(db.get("res_partner", "1").unwrap(), Some(Value::from("Foo")));
        assert_eq!(db.get("res_partner", "2").unwrap(), None);
        let stats = db.recovery_stats();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.committed_seq, SequenceNumber::new(1));
        assert_eq!(db.committed_seq(), SequenceNumber::new(1));
    }

    #[test]
    fn incomplete_transaction_is_dropped() {
        let journal = JournalManager::new(Box::new(InMemoryBackend::new()), false);
        let txid = TransactionId::new(9);
        journal
            .append_batch(&[
                JournalRecord::Begin { txid },
                JournalRecord::Put {
                    txid,
                    key: Key::new("t", "k"),
                    value: Value::Integer(1),
                },
            ])
            .unwrap();
        let data = journal.with_backend(|b| b.read_all().unwrap());

        let db = open_bytes(data).unwrap();
        assert_eq!(db.get("t", "k").unwrap(), None);
        assert_eq!(db.recovery_stats().incomplete, 1);

        // Ids of dropped transactions are not reused.
        db.with_cursor(|cr| cr.put("t", "k", 2)).unwrap();
        let records = db.journal_records().unwrap();
        assert!(records
            .iter()
            .any(|(_, r)| matches!(r, JournalRecord::Begin { txid } if txid.as_u64() == 10)));
    }

    #[test]
    fn torn_tail_is_truncated() {
        let db = Database::open_in_memory().unwrap();
        db.with_cursor(|cr| cr.put("t", "a", 1)).unwrap();
        let good = db.journal_size().unwrap();
        db.with_cursor(|cr| cr.put("t", "b", 2)).unwrap();
        let mut data = journal_bytes(&db);
        drop(db);
        data.truncate(data.len() - 3);

        let db = open_bytes(data).unwrap();
        assert_eq!(db.get("t", "a").unwrap(), Some(Value::Integer(1)));
        assert_eq!(db.get("t", "b").unwrap(), None);
        let stats = db.recovery_stats();
        assert_eq!(stats.incomplete, 1);
        assert!(stats.truncated_bytes > 0);

        // The next commit lands on a clean record boundary.
        db.with_cursor(|cr| cr.put("t", "c", 3)).unwrap();
        assert!(db.journal_records().is_ok());
        assert!(db.journal_size().unwrap() > good);
    }

    #[test]
    fn corrupted_journal_fails_to_open() {
        let db = Database::open_in_memory().unwrap();
        db.with_cursor(|cr| cr.put("t", "a", 1)).unwrap();
        let mut data = journal_bytes(&db);
        data[14] ^= 0x01;

        let err = open_bytes(data).unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn empty_commit_writes_no_journal() {
        let db = Database::open_in_memory().unwrap();
        db.with_cursor(|_| Ok::<_, CoreError>(())).unwrap();
        assert_eq!(db.journal_size().unwrap(), 0);
    }

    #[test]
    fn with_cursor_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: CoreResult<()> = db.with_cursor(|cr| {
            cr.put("t", "k", 1)?;
            Err(CoreError::validation("nope"))
        });
        assert!(result.unwrap_err().is_validation());
        assert_eq!(db.get("t", "k").unwrap(), None);
        assert_eq!(db.connection_count(), 0);
    }

    #[test]
    fn test_mode_is_never_durable() {
        let db = Database::open_in_memory().unwrap();
        db.enter_test_mode().unwrap();
        assert!(db.in_test_mode());
        assert!(db.enter_test_mode().unwrap_err().is_state());

        db.with_cursor(|cr| cr.put("t", "k", 1)).unwrap();
        let _ = db.with_cursor(|cr| -> CoreResult<()> {
            cr.put("t", "other", 2)?;
            Err(CoreError::validation("fail"))
        });
        db.with_cursor(|cr| {
            assert_eq!(cr.get("t", "k")?, Some(Value::Integer(1)));
            assert_eq!(cr.get("t", "other")?, None);
            Ok::<_, CoreError>(())
        })
        .unwrap();

        db.leave_test_mode().unwrap();
        assert!(!db.in_test_mode());
        assert_eq!(db.get("t", "k").unwrap(), None);
        assert_eq!(db.journal_size().unwrap(), 0);
        assert!(db.leave_test_mode().unwrap_err().is_state());
    }

    #[test]
    fn test_mode_allows_one_cursor_at_a_time() {
        let db = Database::open_in_memory().unwrap();
        db.enter_test_mode().unwrap();
        let mut first = db.cursor().unwrap();
        assert!(db.cursor().unwrap_err().is_state());
        assert!(db.leave_test_mode().unwrap_err().is_state());
        first.close().unwrap();
        db.leave_test_mode().unwrap();
    }

    #[test]
    fn closed_database_refuses_work() {
        let db = Database::open_in_memory().unwrap();
        let mut cr = db.cursor().unwrap();
        cr.put("t", "k", 1).unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());

        assert!(matches!(cr.commit(), Err(CoreError::DatabaseClosed)));
        assert_eq!(cr.state(), crate::CursorState::Open);
        cr.close().unwrap();
        assert!(db.cursor().unwrap_err().is_resource());
        assert!(matches!(db.get("t", "k"), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn connections_are_released_on_close() {
        let db = Database::open_in_memory_with_config(Config::default().max_connections(1)).unwrap();
        let mut cr = db.cursor().unwrap();
        assert!(db.cursor().unwrap_err().is_resource());
        cr.close().unwrap();
        assert_eq!(db.connection_count(), 0);
        db.cursor().unwrap().close().unwrap();
    }

    #[test]
    fn compact_preserves_state() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.with_cursor(|cr| cr.put("t", "k", i)).unwrap();
        }
        let stats = db.compact().unwrap();
        assert!(stats.bytes_after < stats.bytes_before);
        let db = reopen(db);
        assert_eq!(db.get("t", "k").unwrap(), Some(Value::Integer(4)));
        assert_eq!(db.committed_seq(), SequenceNumber::new(5));
        assert_eq!(
            db.tables().unwrap(),
            vec![TableStats {
                name: "t".to_string(),
                keys: 1
            }]
        );
    }

    #[test]
    fn open_on_disk_and_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("db");
        {
            let db = Database::open(&path).unwrap();
            db.with_cursor(|cr| cr.put("res_partner", "1", "Foo")).unwrap();
            assert!(matches!(Database::open(&path), Err(CoreError::DatabaseLocked)));
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get("res_partner", "1").unwrap(), Some(Value::from("Foo")));

        drop(db);
        let err = Database::open_with_config(&path, Config::default().error_if_exists(true)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
    }
}
