//! A storage backend that fails on demand.

use parking_lot::Mutex;
use scopedb_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct FaultState {
    data: Mutex<Vec<u8>>,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    fail_on_flush: AtomicBool,
    crashed: AtomicBool,
}

fn simulated(what: &str) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, format!("simulated {what}")))
}

/// An in-memory backend whose writes can be made to fail.
///
/// The database owns the backend; tests steer it through the paired
/// [`FaultHandle`].
#[derive(Debug)]
pub struct FaultyBackend {
    state: Arc<FaultState>,
}

/// Controls a [`FaultyBackend`] after it was handed to a database.
#[derive(Debug, Clone)]
pub struct FaultHandle {
    state: Arc<FaultState>,
}

impl FaultyBackend {
    /// Creates an empty backend and its handle.
    pub fn with_handle() -> (Self, FaultHandle) {
        let state = Arc::new(FaultState {
            data: Mutex::new(Vec::new()),
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            fail_on_flush: AtomicBool::new(false),
            crashed: AtomicBool::new(false),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            FaultHandle { state },
        )
    }
}

impl FaultHandle {
    /// Fails every append once `bytes` more bytes have been written. The
    /// append crossing the limit writes only the bytes before it.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.state.bytes_written.load(Ordering::SeqCst);
        self.state
            .crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Makes `flush` and `sync` fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.state.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Clears every injected fault.
    pub fn reset(&self) {
        self.state.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.state.fail_on_flush.store(false, Ordering::SeqCst);
        self.state.crashed.store(false, Ordering::SeqCst);
    }

    /// Returns `true` if an injected fault fired.
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.state.data.lock().clone()
    }

    /// Returns a plain backend holding the stored bytes, for reopening.
    pub fn to_backend(&self) -> InMemoryBackend {
        InMemoryBackend::with_data(self.bytes())
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.state.data.lock();
        let size = data.len() as u64;
        if offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let current = self.state.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        let threshold = self.state.crash_after_bytes.load(Ordering::SeqCst);
        let mut data = self.state.data.lock();
        let offset = data.len() as u64;

        if current.saturating_add(bytes.len()) > threshold {
            self.state.crashed.store(true, Ordering::SeqCst);
            let partial = threshold.saturating_sub(current);
            data.extend_from_slice(&bytes[..partial]);
            return Err(simulated("crash during write"));
        }

        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            self.state.crashed.store(true, Ordering::SeqCst);
            return Err(simulated("crash during flush"));
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.state.data.lock().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.flush()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.state.data.lock();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }

    /// Models a scratch file renamed into place: a fault before the rename
    /// leaves the old content untouched.
    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let current = self.state.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        let threshold = self.state.crash_after_bytes.load(Ordering::SeqCst);
        if current.saturating_add(bytes.len()) > threshold {
            self.state.crashed.store(true, Ordering::SeqCst);
            return Err(simulated("crash while writing replacement"));
        }
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            self.state.crashed.store(true, Ordering::SeqCst);
            return Err(simulated("crash while syncing replacement"));
        }
        *self.state.data.lock() = bytes.to_vec();
        Ok(())
    }
}
