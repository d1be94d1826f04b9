//! Record Codec Module
//!
//! Encodes a value and its absolute expiration into the persisted record
//! format, and decodes records back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Cache Record ==
/// Persisted form of a single entry.
///
/// On disk this is `{ "value": "<JSON text>", "expire": "<epoch millis>" }`:
/// both fields are strings, the payload being the JSON encoding of the
/// cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// JSON text of the cached value
    pub value: String,
    /// Absolute expiration timestamp (Unix milliseconds) as a decimal string
    pub expire: String,
}

impl CacheRecord {
    // == Constructor ==
    /// Builds a record expiring `ttl_seconds` from now.
    pub fn new(value: &Value, ttl_seconds: u64) -> Result<Self> {
        Self::with_timestamp(value, ttl_seconds, current_timestamp_ms())
    }

    /// Builds a record written at `now_ms`.
    pub fn with_timestamp(value: &Value, ttl_seconds: u64, now_ms: u64) -> Result<Self> {
        let value =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;

        Ok(Self {
            value,
            expire: expire_at(now_ms, ttl_seconds).to_string(),
        })
    }

    // == Expiration ==
    /// Returns the absolute expiration timestamp.
    pub fn expire_at(&self) -> Result<u64> {
        self.expire.trim().parse().map_err(|_| {
            CacheError::Deserialization(format!("invalid expire field '{}'", self.expire))
        })
    }

    /// A record is expired once its expiration lies strictly in the past.
    pub fn is_expired_at(&self, now_ms: u64) -> Result<bool> {
        Ok(self.expire_at()? < now_ms)
    }

    /// Checks expiration against the current clock.
    pub fn is_expired(&self) -> Result<bool> {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Payload ==
    /// Decodes the stored value.
    pub fn payload(&self) -> Result<Value> {
        serde_json::from_str(&self.value).map_err(|e| CacheError::Deserialization(e.to_string()))
    }

    // == Wire Format ==
    /// Serializes the record into the bytes written to storage.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Parses a record read back from storage.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Absolute expiration of an entry written at `now_ms` with the given TTL.
pub fn expire_at(now_ms: u64, ttl_seconds: u64) -> u64 {
    now_ms.saturating_add(ttl_seconds.saturating_mul(1000))
}
