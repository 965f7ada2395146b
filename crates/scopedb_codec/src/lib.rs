//! # ScopeDB Codec
//!
//! Deterministic CBOR (RFC 8949 §4.2.1) for the scalar values ScopeDB
//! stores: null, booleans, 64-bit integers, text and byte strings.
//!
//! Equal values always encode to identical bytes, and the decoder rejects
//! any non-shortest encoding, so journal records can be compared bytewise.
//!
//! ```
//! use scopedb_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let bytes = to_canonical_cbor(&Value::from("B"));
//! assert_eq!(from_cbor(&bytes).unwrap(), Value::Text("B".into()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            ".{0,40}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(value in value_strategy()) {
            let bytes = to_canonical_cbor(&value);
            prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
        }

        #[test]
        fn encoding_is_deterministic(value in value_strategy()) {
            prop_assert_eq!(to_canonical_cbor(&value), to_canonical_cbor(&value.clone()));
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_canonical_cbor(&Value::Integer(7));
        bytes.push(0x00);
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::TrailingBytes { count: 1 })
        ));
    }
}
