//! CLI command implementations.

pub mod compact;
pub mod dump_journal;
pub mod exec;
pub mod inspect;
pub mod verify;

use scopedb_core::journal::JournalManager;
use scopedb_storage::FileBackend;
use std::path::Path;

/// Name of the journal file inside a database directory.
pub const JOURNAL_FILE: &str = "journal.log";

/// Opens the journal of the database at `path` without taking the lock.
///
/// Used by the read-only commands, which must work on a journal that
/// recovery would reject.
pub fn open_journal(path: &Path) -> Result<JournalManager, Box<dyn std::error::Error>> {
    let journal_path = path.join(JOURNAL_FILE);
    if !journal_path.exists() {
        return Err(format!("Journal file not found at {}", journal_path.display()).into());
    }
    let backend = FileBackend::open(&journal_path)?;
    Ok(JournalManager::new(Box::new(backend), false))
}
