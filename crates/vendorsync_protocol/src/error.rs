//! Error types for the protocol codecs.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The value could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The bytes are not valid CBOR for the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The payload decoded but violates a structural invariant.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

impl ProtocolError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}
