//! Streaming journal iterator.

use super::{CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::journal::record::{compute_crc32, JournalRecord, RecordType, JOURNAL_MAGIC, JOURNAL_VERSION};
use parking_lot::MutexGuard;
use scopedb_storage::StorageBackend;

/// Iterator over journal records, one backend read per header and body.
///
/// - a truncated header or body ends iteration with no error
/// - bad magic, newer version, unknown type or CRC mismatch is an error,
///   after which the iterator yields nothing more
pub struct JournalIterator<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> JournalIterator<'a> {
    /// Creates an iterator starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn new(
        backend: MutexGuard<'a, Box<dyn StorageBackend>>,
        start_offset: u64,
    ) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: start_offset,
            finished: false,
        })
    }

    /// Offset just past the last fully read record.
    ///
    /// After a clean end this is where a torn tail begins.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.offset)
    }

    fn corrupt(&mut self, message: String) -> CoreError {
        self.finished = true;
        CoreError::journal_corruption(message)
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, JournalRecord)>> {
        if self.finished {
            return Ok(None);
        }
        let start = self.offset;

        if self.remaining() < HEADER_SIZE as u64 {
            self.finished = true;
            return Ok(None);
        }
        let header = self.backend.read_at(start, HEADER_SIZE)?;

        if header[0..4] != JOURNAL_MAGIC {
            return Err(self.corrupt(format!("invalid magic at offset {start}")));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {version} at offset {start}"
            )));
        }
        let type_byte = header[6];
        let Some(record_type) = RecordType::from_byte(type_byte) else {
            return Err(self.corrupt(format!(
                "unknown record type {type_byte} at offset {start}"
            )));
        };
        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let body_len = payload_len + CRC_SIZE;
        if self.remaining() < (HEADER_SIZE + body_len) as u64 {
            self.finished = true;
            return Ok(None);
        }
        let body = self.backend.read_at(start + HEADER_SIZE as u64, body_len)?;
        let (payload, crc_bytes) = body.split_at(payload_len);

        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let mut covered = header;
        covered.extend_from_slice(payload);
        let actual = compute_crc32(&covered);
        if expected != actual {
            self.finished = true;
            return Err(CoreError::ChecksumMismatch {
                offset: start,
                expected,
                actual,
            });
        }

        let record = match JournalRecord::decode_payload(record_type, payload) {
            Ok(record) => record,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        self.offset = start + (HEADER_SIZE + body_len) as u64;
        Ok(Some((start, record)))
    }
}

impl Iterator for JournalIterator<'_> {
    type Item = CoreResult<(u64, JournalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
