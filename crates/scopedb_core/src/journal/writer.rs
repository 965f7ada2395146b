//! Journal writer and reader.

use super::{JournalIterator, CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::journal::record::{compute_crc32, JournalRecord, JOURNAL_MAGIC, JOURNAL_VERSION};
use parking_lot::Mutex;
use scopedb_storage::StorageBackend;

/// Append-only access to the journal.
///
/// All writes go through one mutex, so a batch appended by
/// [`append_batch`](Self::append_batch) is never interleaved with another.
pub struct JournalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl JournalManager {
    /// Creates a journal manager over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Encodes one record with its envelope.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the payload exceeds 4 GiB.
    pub fn encode_frame(record: &JournalRecord) -> CoreResult<Vec<u8>> {
        let payload = record.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::validation("journal record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Appends a single record and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn append(&self, record: &JournalRecord) -> CoreResult<u64> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Appends `records` with a single backend write, then flushes.
    ///
    /// Syncs as well when the journal was created with `sync_on_commit`.
    /// Returns the offset of the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, the write, or the flush fails. Nothing
    /// is written if encoding fails.
    pub fn append_batch(&self, records: &[JournalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&Self::encode_frame(record)?);
        }

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;
        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }
        Ok(offset)
    }

    /// Flushes pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Forces the journal to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns an iterator over `(offset, record)` pairs.
    ///
    /// The backend stays locked while the iterator lives.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal size cannot be read.
    pub fn iter(&self) -> CoreResult<JournalIterator<'_>> {
        JournalIterator::new(self.backend.lock(), 0)
    }

    /// Reads every record into memory.
    ///
    /// # Errors
    ///
    /// Returns the first corruption or I/O error encountered.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, JournalRecord)>> {
        self.iter()?.collect()
    }

    /// Discards everything after `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is past the end or the truncate fails.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        self.backend.lock().truncate(offset)?;
        Ok(())
    }

    /// Replaces the whole journal with `records` and syncs.
    ///
    /// The swap is all or nothing: if it fails the previous journal is
    /// still in place (see [`StorageBackend::replace`]).
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend swap fails. Encoding
    /// happens before the journal is touched.
    pub fn replace(&self, records: &[JournalRecord]) -> CoreResult<()> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&Self::encode_frame(record)?);
        }

        self.backend.lock().replace(&data)?;
        Ok(())
    }

    /// Runs `f` against the raw backend.
    #[cfg(test)]
    pub(crate) fn with_backend<T>(&self, f: impl FnOnce(&mut dyn StorageBackend) -> T) -> T {
        let mut backend = self.backend.lock();
        f(backend.as_mut())
    }
}
