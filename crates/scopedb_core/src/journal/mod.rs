//! The journal: ScopeDB's append-only commit log.
//!
//! Only root commits reach the journal; nested scopes live in memory until
//! their root commits. A root commit with writes is appended as one batch:
//!
//! ```text
//! BEGIN txid | PUT/DELETE ... | COMMIT txid seq
//! ```
//!
//! ## Record format
//!
//! ```text
//! | magic "SJNL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers every byte before it.
//!
//! ## Recovery policy
//!
//! - A truncated header or payload at the tail is a torn write: iteration
//!   ends cleanly and the incomplete transaction is dropped.
//! - A CRC mismatch, bad magic, unknown type or newer version is fatal.
//! - Only transactions whose `COMMIT` record is present are replayed.

mod iterator;
mod record;
mod writer;

pub use iterator::JournalIterator;
pub use record::{compute_crc32, JournalRecord, RecordType, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use writer::JournalManager;

/// Header size: magic (4) + version (2) + type (1) + length (4).
pub const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 4;
