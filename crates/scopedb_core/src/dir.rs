//! Database directory layout and locking.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # advisory lock, held while the database is open
//! └─ journal.log   # commit journal
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";

/// An opened database directory.
///
/// Holds an exclusive lock on `LOCK` until dropped, so only one process
/// can open the directory at a time.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens (and optionally creates) a database directory and locks it.
    ///
    /// # Errors
    ///
    /// - invalid format if the directory is missing and `create_if_missing`
    ///   is false, or `path` is not a directory
    /// - [`CoreError::DatabaseLocked`] if another handle holds the lock
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    /// Returns `true` if no journal has been written yet.
    pub(crate) fn is_new_database(&self) -> bool {
        fs::metadata(self.journal_path())
            .map(|meta| meta.len() == 0)
            .unwrap_or(true)
    }
}
