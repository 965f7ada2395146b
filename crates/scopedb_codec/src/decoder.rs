//! Canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Upper bound on a decoded text or byte string.
const MAX_STRING_LENGTH: u64 = 256 * 1024 * 1024;

/// Decodes exactly one value from `bytes`.
///
/// # Errors
///
/// Returns an error for truncated or non-canonical input, unsupported types,
/// or trailing bytes after the value.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// Streaming decoder over a byte slice.
#[derive(Debug)]
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Creates a decoder positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decodes the next value.
    ///
    /// # Errors
    ///
    /// Returns an error if the next item is malformed or unsupported.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial = self.read_byte()?;
        let major_type = initial >> 5;
        let info = initial & 0x1f;

        match major_type {
            0 => {
                let n = self.read_argument(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                let n = self.read_argument(info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(Value::Integer(-1 - n))
            }
            2 => {
                let bytes = self.read_string(info)?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            3 => {
                let bytes = self.read_string(info)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => Err(CodecError::unsupported_type("array")),
            5 => Err(CodecError::unsupported_type("map")),
            6 => Err(CodecError::unsupported_type("tag")),
            _ => self.decode_simple(info),
        }
    }

    /// Returns `true` once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the unread bytes.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_argument(&mut self, info: u8) -> CodecResult<u64> {
        let (value, min) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => (u64::from(self.read_byte()?), 24),
            25 => {
                let b = self.read_exact(2)?;
                (u64::from(u16::from_be_bytes([b[0], b[1]])), 0x100)
            }
            26 => {
                let b = self.read_exact(4)?;
                (u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])), 0x1_0000)
            }
            27 => {
                let b = self.read_exact(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(b);
                (u64::from_be_bytes(buf), 0x1_0000_0000)
            }
            31 => return Err(CodecError::IndefiniteLengthForbidden),
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        if value < min {
            return Err(CodecError::invalid_structure(
                "non-canonical: argument could be encoded in fewer bytes",
            ));
        }
        Ok(value)
    }

    fn read_string(&mut self, info: u8) -> CodecResult<&'a [u8]> {
        let len = self.read_argument(info)?;
        if len > MAX_STRING_LENGTH {
            return Err(CodecError::invalid_structure(format!(
                "string length {len} exceeds limit"
            )));
        }
        self.read_exact(len as usize)
    }

    fn decode_simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25..=27 => Err(CodecError::FloatForbidden),
            31 => Err(CodecError::invalid_structure("break without indefinite item")),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalars() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
        assert_eq!(from_cbor(&[0x18, 100]).unwrap(), Value::Integer(100));
        assert_eq!(from_cbor(&[0x38, 24]).unwrap(), Value::Integer(-25));
        assert_eq!(from_cbor(&[0x62, b'o', b'k']).unwrap(), Value::from("ok"));
    }

    #[test]
    fn rejects_non_shortest_integer() {
        assert!(matches!(
            from_cbor(&[0x18, 5]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0x19, 0x00, 0xff]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_integer() {
        let bytes = [0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(from_cbor(&bytes), Err(CodecError::IntegerOverflow));
    }

    #[test]
    fn rejects_floats_and_containers() {
        assert_eq!(
            from_cbor(&[0xf9, 0x3c, 0x00]),
            Err(CodecError::FloatForbidden)
        );
        assert!(matches!(
            from_cbor(&[0x80]),
            Err(CodecError::UnsupportedType { .. })
        ));
        assert_eq!(
            from_cbor(&[0x5f]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
    }

    #[test]
    fn rejects_truncated_and_bad_utf8() {
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x63, b'a']), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x61, 0xff]), Err(CodecError::InvalidUtf8));
    }
}
