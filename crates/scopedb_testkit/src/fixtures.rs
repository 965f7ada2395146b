//! Test fixtures and database helpers.

use scopedb_core::{Config, Database};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates an in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test database with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            db: Database::open_in_memory_with_config(config)
                .expect("Failed to open in-memory database"),
            temp_dir: None,
        }
    }

    /// Creates an on-disk test database in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database directory if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("db"))
    }

    /// Closes and reopens an on-disk database from its journal.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory database or if reopening fails.
    pub fn reopen(self) -> Self {
        let Self { db, temp_dir } = self;
        let temp_dir = temp_dir.expect("only file databases can be reopened");
        drop(db);
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to reopen database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary on-disk database and its directory.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Runs a test with a database in test mode, leaving test mode afterwards.
pub fn with_test_mode<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    test_db.enter_test_mode().expect("Failed to enter test mode");
    let result = f(&test_db.db);
    test_db.leave_test_mode().expect("Failed to leave test mode");
    result
}

/// Ready-made database states.
pub mod scenarios {
    use super::*;

    /// A database with `count` committed partners `res_partner/1..=count`.
    pub fn populated_database(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        test_db
            .with_cursor(|cr| {
                for i in 1..=count {
                    cr.put("res_partner", i.to_string(), format!("Partner {i}"))?;
                }
                Ok::<_, scopedb_core::CoreError>(())
            })
            .expect("Failed to populate database");
        test_db
    }
}
