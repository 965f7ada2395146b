//! # ScopeDB Storage
//!
//! The lowest layer of ScopeDB: an append-only byte store that the journal
//! writes its records into.
//!
//! Backends never interpret the bytes they hold. Record framing, checksums
//! and recovery all live in `scopedb_core`.
//!
//! ## Backends
//!
//! - [`InMemoryBackend`] - ephemeral databases and tests
//! - [`FileBackend`] - a single file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use scopedb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"journal bytes").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"journal");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
