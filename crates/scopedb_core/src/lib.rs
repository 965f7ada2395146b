//! # ScopeDB Core
//!
//! An embedded key/value store whose client surface is a transactional
//! cursor.
//!
//! - A root [`Cursor`] is one unit of work over its own connection.
//! - [`Cursor::begin`] opens a nested cursor that behaves like a savepoint:
//!   its writes reach the parent only if it commits before closing.
//! - [`Cursor::after`] attaches hooks that fire on `commit`, `rollback` or
//!   `close`, exactly once and in registration order.
//! - Root commits are appended to a checksummed journal and replayed on
//!   open.
//!
//! ```rust
//! use scopedb_core::{Database, Value};
//!
//! let db = Database::open_in_memory()?;
//! let mut cr = db.cursor()?;
//! cr.put("res_partner", "1", "A")?;
//!
//! let mut sub = cr.begin()?;
//! sub.put("res_partner", "1", "B")?;
//! sub.rollback()?;
//! sub.close()?;
//!
//! assert_eq!(cr.get("res_partner", "1")?, Some(Value::from("A")));
//! cr.commit()?;
//! cr.close()?;
//! # Ok::<(), scopedb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cursor;
mod database;
#[cfg(feature = "std")]
mod dir;
mod engine;
mod error;
pub mod journal;
pub mod query;
mod store;
pub mod transaction;
mod types;

pub use config::Config;
pub use cursor::{Cursor, CursorState, Hook, HookEvent};
pub use database::{Database, RecoveryStats};
pub use error::{CoreError, CoreResult};
pub use query::{Params, QueryResult, Row};
pub use scopedb_codec::Value;
pub use store::TableStats;
pub use transaction::{CompactStats, PendingWrite, WriteSet};
pub use types::{Key, SavepointId, SequenceNumber, TransactionId};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
