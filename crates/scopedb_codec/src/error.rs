//! Codec error types.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding CBOR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remain after the top-level item.
    #[error("{count} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// Text string is not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Indefinite-length items are not canonical.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Floats are never stored.
    #[error("float values are forbidden")]
    FloatForbidden,

    /// Integer argument does not fit an `i64`.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Well-formed CBOR that ScopeDB never writes (arrays, maps, tags).
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the rejected type.
        type_name: String,
    },

    /// Structurally invalid or non-canonical input.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// What was wrong.
        message: String,
    },
}

impl CodecError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
