//! Error types for decoding operations.

use std::fmt;

/// Errors that can occur while decoding a tile or reading its property tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The four-byte tag at the start of the tile is not the expected one.
    BadMagic { expected: [u8; 4], actual: [u8; 4] },
    /// The header declares a version this decoder does not understand.
    UnsupportedVersion { version: u32 },
    /// The header declares a zero-length model payload.
    EmptyPayload,
    /// The payload format flag is neither external-reference nor embedded.
    UnsupportedPayloadFormat { format: u32 },
    /// A read ran past the end of the supplied buffer.
    TruncatedBuffer {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A JSON section could not be parsed.
    InvalidJson {
        context: &'static str,
        detail: String,
    },
    /// A string section is not valid UTF-8.
    InvalidUtf8 { context: &'static str },
    /// A binary-backed property was read without a component type.
    MissingComponentType { semantic: String },
    /// No descriptor exists for the requested property name.
    InvalidSemantic { semantic: String },
    /// A per-record lookup was outside `[0, len)`.
    IndexOutOfRange { index: i64, len: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { expected, actual } => {
                write!(
                    f,
                    "bad magic: expected {:?}, read {:?}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(actual)
                )
            }
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported version {version}")
            }
            Self::EmptyPayload => write!(f, "model payload byte length is zero"),
            Self::UnsupportedPayloadFormat { format } => {
                write!(
                    f,
                    "unsupported payload format {format} (expected 0 for uri or 1 for embedded)"
                )
            }
            Self::TruncatedBuffer {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "truncated buffer in {context}: needed {expected} bytes, {actual} available"
                )
            }
            Self::InvalidJson { context, detail } => {
                write!(f, "invalid json in {context}: {detail}")
            }
            Self::InvalidUtf8 { context } => write!(f, "invalid utf-8 in {context}"),
            Self::MissingComponentType { semantic } => {
                write!(
                    f,
                    "component type is required to read binary property {semantic:?}"
                )
            }
            Self::InvalidSemantic { semantic } => {
                write!(f, "no property named {semantic:?}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
