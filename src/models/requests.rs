//! Request bodies of the cache service.

use serde::Deserialize;
use serde_json::Value;

/// Body of `PUT /set`.
///
/// A missing `value` deserializes as null and fails validation; a missing
/// `ttl` falls back to the configured default.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    /// Seconds until expiry
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Message describing the first invalid field, if any.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.value.is_null() {
            return Some("Value cannot be null".to_string());
        }
        None
    }
}
