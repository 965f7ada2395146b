//! Database configuration.

/// Options for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,

    /// Fail if the database directory already holds a journal.
    pub error_if_exists: bool,

    /// `fsync` the journal on every root commit. When false, a commit is
    /// only flushed to the OS.
    pub sync_on_commit: bool,

    /// Maximum nesting depth of one connection, root scope included.
    /// Opening a scope beyond it fails with a resource error.
    pub max_savepoints: usize,

    /// Maximum number of simultaneously open root cursors.
    pub max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_savepoints: 64,
            max_connections: 64,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail when the database already exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the journal on every root commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the maximum nesting depth per connection.
    #[must_use]
    pub const fn max_savepoints(mut self, depth: usize) -> Self {
        self.max_savepoints = depth;
        self
    }

    /// Sets the maximum number of open root cursors.
    #[must_use]
    pub const fn max_connections(mut self, count: usize) -> Self {
        self.max_connections = count;
        self
    }
}
