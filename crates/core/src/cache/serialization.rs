//! JSON encoding of cache payloads.
//!
//! Values are stored as JSON so a cache can be inspected with any client.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::{CacheEntry, CachedIndex, IndexRegistry};

/// Errors that can occur during cache serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

impl From<SerializationError> for super::CacheError {
    fn from(error: SerializationError) -> Self {
        super::CacheError::Serialization(error.to_string())
    }
}

fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

pub fn serialize_entry(entry: &CacheEntry) -> Result<Vec<u8>> {
    to_bytes(entry)
}

pub fn deserialize_entry(bytes: &[u8]) -> Result<CacheEntry> {
    from_bytes(bytes)
}

pub fn serialize_index(index: &CachedIndex) -> Result<Vec<u8>> {
    to_bytes(index)
}

pub fn deserialize_index(bytes: &[u8]) -> Result<CachedIndex> {
    from_bytes(bytes)
}

pub fn serialize_registry(registry: &IndexRegistry) -> Result<Vec<u8>> {
    to_bytes(registry)
}

pub fn deserialize_registry(bytes: &[u8]) -> Result<IndexRegistry> {
    from_bytes(bytes)
}

/// Generation tokens are stored as raw UTF-8.
pub fn deserialize_generation(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}
