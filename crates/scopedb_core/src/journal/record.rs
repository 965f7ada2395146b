//! Journal record types and payload encoding.

use crate::error::{CoreError, CoreResult};
use crate::types::{Key, SequenceNumber, TransactionId};
use scopedb_codec::{from_cbor, to_canonical_cbor, Value};

/// Magic bytes opening every record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"SJNL";

/// Current record format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Start of a root transaction.
    Begin = 1,
    /// Value written under a key.
    Put = 2,
    /// Key removed.
    Delete = 3,
    /// End of a root transaction.
    Commit = 4,
    /// Journal was rewritten from a snapshot at this sequence.
    Checkpoint = 5,
}

impl RecordType {
    /// Parses a type byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Put),
            3 => Some(Self::Delete),
            4 => Some(Self::Commit),
            5 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Returns the type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Upper-case name used by the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Commit => "COMMIT",
            Self::Checkpoint => "CHECKPOINT",
        }
    }
}

/// One journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Start of a root transaction.
    Begin {
        /// Transaction id.
        txid: TransactionId,
    },
    /// Value written under a key.
    Put {
        /// Transaction id.
        txid: TransactionId,
        /// Target key.
        key: Key,
        /// New value.
        value: Value,
    },
    /// Key removed.
    Delete {
        /// Transaction id.
        txid: TransactionId,
        /// Removed key.
        key: Key,
    },
    /// End of a root transaction.
    Commit {
        /// Transaction id.
        txid: TransactionId,
        /// Commit sequence.
        sequence: SequenceNumber,
    },
    /// Snapshot marker written by compaction.
    Checkpoint {
        /// Committed sequence at the time of the snapshot.
        sequence: SequenceNumber,
    },
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Begin { .. } => RecordType::Begin,
            Self::Put { .. } => RecordType::Put,
            Self::Delete { .. } => RecordType::Delete,
            Self::Commit { .. } => RecordType::Commit,
            Self::Checkpoint { .. } => RecordType::Checkpoint,
        }
    }

    /// Returns the transaction id, if the record belongs to one.
    #[must_use]
    pub fn txid(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. } => Some(*txid),
            Self::Checkpoint { .. } => None,
        }
    }

    /// Serializes the payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns a validation error if a table, key or encoded value does not
    /// fit the 4-byte length prefix.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } => put_u64(&mut buf, txid.as_u64()),
            Self::Put { txid, key, value } => {
                put_u64(&mut buf, txid.as_u64());
                put_key(&mut buf, key)?;
                put_bytes(&mut buf, &to_canonical_cbor(value))?;
            }
            Self::Delete { txid, key } => {
                put_u64(&mut buf, txid.as_u64());
                put_key(&mut buf, key)?;
            }
            Self::Commit { txid, sequence } => {
                put_u64(&mut buf, txid.as_u64());
                put_u64(&mut buf, sequence.as_u64());
            }
            Self::Checkpoint { sequence } => put_u64(&mut buf, sequence.as_u64()),
        }
        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns a journal corruption error if the payload is short, has
    /// trailing bytes, or holds an undecodable string or value.
    pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader { payload, pos: 0 };

        let record = match record_type {
            RecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            RecordType::Put => {
                let txid = TransactionId::new(reader.u64()?);
                let key = reader.key()?;
                let value = from_cbor(reader.bytes()?).map_err(|e| {
                    CoreError::journal_corruption(format!("undecodable value for {key}: {e}"))
                })?;
                Self::Put { txid, key, value }
            }
            RecordType::Delete => Self::Delete {
                txid: TransactionId::new(reader.u64()?),
                key: reader.key()?,
            },
            RecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
                sequence: SequenceNumber::new(reader.u64()?),
            },
            RecordType::Checkpoint => Self::Checkpoint {
                sequence: SequenceNumber::new(reader.u64()?),
            },
        };

        if reader.pos != payload.len() {
            return Err(CoreError::journal_corruption(format!(
                "trailing bytes in {} record: expected {} bytes, got {}",
                record_type.name(),
                reader.pos,
                payload.len()
            )));
        }
        Ok(record)
    }
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        CoreError::validation(format!("field of {} bytes is too large", bytes.len()))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn put_key(buf: &mut Vec<u8>, key: &Key) -> CoreResult<()> {
    put_bytes(buf, key.table.as_bytes())?;
    put_bytes(buf, key.key.as_bytes())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::journal_corruption("unexpected end of payload"))?;
        let bytes = &self.payload[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn bytes(&mut self) -> CoreResult<&'a [u8]> {
        let mut len = [0u8; 4];
        len.copy_from_slice(self.take(4)?);
        self.take(u32::from_le_bytes(len) as usize)
    }

    fn string(&mut self) -> CoreResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::journal_corruption("key is not valid UTF-8"))
    }

    fn key(&mut self) -> CoreResult<Key> {
        let table = self.string()?;
        let key = self.string()?;
        Ok(Key { table, key })
    }
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
