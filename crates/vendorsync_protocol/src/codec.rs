//! CBOR helpers shared by the protocol types.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
pub(crate) fn to_cbor<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decodes a value from CBOR bytes.
pub(crate) fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    if bytes.is_empty() {
        return Err(ProtocolError::Decode("empty payload".into()));
    }
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
