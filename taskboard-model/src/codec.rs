//! JSON encoding of locally persisted blobs.
//!
//! Every key of the local store holds one JSON document. The layout is
//! versioned by a separate `schemaVersion` key holding [`SCHEMA_VERSION`].

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Version of the persisted local layout written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The stored schema version is not a number.
    #[error("invalid schema version: {0}")]
    InvalidVersion(String),
}

/// Encodes a value as a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a value from a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Parses a stored schema version blob.
///
/// # Errors
///
/// Returns `CodecError::InvalidVersion` if the blob is not an unsigned integer.
pub fn decode_version(text: &str) -> Result<u32, CodecError> {
    text.trim()
        .parse()
        .map_err(|_| CodecError::InvalidVersion(text.to_string()))
}
