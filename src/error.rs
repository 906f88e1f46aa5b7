//! Error taxonomy for encode, decode and traversal.

use thiserror::Error;

/// The codec's type system cannot carry the tree, or emitting bytes failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{codec} cannot represent {what}")]
    Unrepresentable { codec: &'static str, what: String },

    #[error("{codec}: serializer failed: {source}")]
    Serializer {
        codec: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("i/o failure while emitting bytes: {0}")]
    Io(#[from] std::io::Error),
}

/// Input bytes are malformed, truncated or semantically invalid.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input truncated at offset {offset}: needed {needed} more byte(s)")]
    Truncated { offset: usize, needed: usize },

    #[error("malformed input at offset {offset}: {detail}")]
    Malformed { offset: usize, detail: String },

    #[error("unsupported type marker 0x{marker:02x} at offset {offset}")]
    UnsupportedType { offset: usize, marker: u8 },

    #[error("container declared {declared} element(s) but produced {actual}")]
    CountMismatch { declared: u32, actual: u32 },

    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("{remaining} trailing byte(s) after the root value")]
    TrailingBytes { remaining: usize },

    #[error("{codec}: parser failed: {source}")]
    Parser {
        codec: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// An adapter drove the traversal out of canonical order. This is a defect
/// in the adapter, not in the data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("map value folded without a preceding key")]
    ValueWithoutKey,

    #[error("key folded outside of a map")]
    KeyOutsideMap,

    #[error("two keys folded in a row")]
    KeyAfterKey,

    #[error("map closed with a dangling key")]
    DanglingKey,

    #[error("closed a {closed} while the innermost open container is a {open}")]
    MismatchedEnd { closed: &'static str, open: &'static str },

    #[error("closed a {closed} with no container open")]
    UnbalancedEnd { closed: &'static str },

    #[error("event after the root value was complete")]
    AfterRoot,

    #[error("{open} container(s) still open when the fold finished")]
    Unterminated { open: usize },

    #[error("fold finished without a root value")]
    NoRoot,

    #[error("container holds more than u32::MAX entries")]
    CountOverflow,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
}

impl Error {
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, Error::Encode(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
