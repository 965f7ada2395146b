//! Error types for ScopeDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by cursors, the journal and the database handle.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] scopedb_storage::StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] scopedb_codec::CodecError),

    /// I/O error outside the storage backend (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied argument has the wrong shape: unknown hook event,
    /// malformed statement, or parameters that are not a sequence or mapping.
    #[error("validation error: {message}")]
    Validation {
        /// What was rejected.
        message: String,
    },

    /// The operation is not allowed in the cursor's current state: the
    /// cursor is closed or resolved, or it still has an open child.
    #[error("invalid cursor state: {message}")]
    State {
        /// Why the operation was refused.
        message: String,
    },

    /// No new scope could be allocated on the connection.
    #[error("resource exhausted: {message}")]
    Resource {
        /// Which resource ran out.
        message: String,
    },

    /// The journal contains a record that cannot be decoded.
    #[error("journal corruption: {message}")]
    JournalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A journal record's CRC does not match its contents.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The database directory is missing, unexpected, or not a directory.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the directory lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database handle was closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Creates a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns `true` for [`CoreError::Validation`].
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` for [`CoreError::State`].
    #[must_use]
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Returns `true` for [`CoreError::Resource`].
    #[must_use]
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        assert!(CoreError::validation("bad event").is_validation());
        assert!(CoreError::state("closed").is_state());
        assert!(CoreError::resource("no savepoint").is_resource());
        assert!(!CoreError::DatabaseClosed.is_state());
    }

    #[test]
    fn messages_name_the_kind() {
        assert_eq!(
            CoreError::validation("unknown hook event 'flush'").to_string(),
            "validation error: unknown hook event 'flush'"
        );
        assert_eq!(
            CoreError::ChecksumMismatch {
                offset: 19,
                expected: 0xdead_beef,
                actual: 1
            }
            .to_string(),
            "checksum mismatch at offset 19: expected deadbeef, got 00000001"
        );
    }
}
