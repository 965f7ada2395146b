//! The storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, which is the size
///   of the store before the call
/// - `read_at` returns exactly the bytes previously appended at that range
/// - after `flush` returns, appended bytes survive process exit
/// - after `sync` returns, they also survive power loss
///
/// Implementations must be `Send + Sync` so a database handle can be shared
/// between threads.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not fully
    /// inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes appended data out of process buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Forces data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Discards everything after `new_size`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the whole content with `data` and syncs.
    ///
    /// Either the new content is in place or the old content is kept.
    /// This default restores the old bytes when the rewrite fails, which
    /// only holds while the process keeps running; backends that can swap
    /// content atomically override it.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the rewrite.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let old = self.read_all()?;
        let result = self
            .truncate(0)
            .and_then(|()| self.append(data))
            .and_then(|_| self.flush())
            .and_then(|()| self.sync());
        if result.is_err() {
            self.truncate(0)?;
            self.append(&old)?;
            self.flush()?;
        }
        result
    }

    /// Reads the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the size or the read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size)
            .map_err(|_| crate::StorageError::Corrupted(format!("store too large: {size} bytes")))?;
        self.read_at(0, len)
    }
}
