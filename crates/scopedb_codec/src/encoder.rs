//! Canonical CBOR encoder.

use crate::value::Value;

/// Encodes a value to canonical CBOR.
///
/// Integers and lengths always use the shortest form, so encoding is a pure
/// function of the value.
#[must_use]
pub fn to_canonical_cbor(value: &Value) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// Accumulates canonical CBOR for one or more values.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the encoding of `value`.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Bytes(b) => {
                self.encode_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.encode_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_head(0, n as u64);
        } else {
            // -1 encodes as argument 0, -2 as 1, ...
            self.encode_head(1, (-(n + 1)) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major_type: u8, argument: u64) {
        let mt = major_type << 5;
        if argument < 24 {
            self.buffer.push(mt | argument as u8);
        } else if let Ok(v) = u8::try_from(argument) {
            self.buffer.push(mt | 24);
            self.buffer.push(v);
        } else if let Ok(v) = u16::try_from(argument) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&v.to_be_bytes());
        } else if let Ok(v) = u32::try_from(argument) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&v.to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&argument.to_be_bytes());
        }
    }
}
