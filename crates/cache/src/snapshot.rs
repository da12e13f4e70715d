//! Opaque-blob encoding for cache snapshots.
//!
//! Every cache exposes `snapshot()`/`restore()` with a serde-derived
//! snapshot type; these helpers turn any of them into bytes for
//! checkpoint files and back. Store handles are never part of a
//! snapshot; restore targets a cache that already owns an open store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// Encodes a snapshot as an opaque byte blob.
pub fn to_bytes<T: Serialize>(snapshot: &T) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(snapshot).map_err(|e| CacheError::Snapshot {
        reason: e.to_string(),
    })
}

/// Decodes a snapshot from an opaque byte blob.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Snapshot {
        reason: e.to_string(),
    })
}
