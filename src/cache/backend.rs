//! Cache Backend Contract
//!
//! The capability set shared by the memory, file and remote backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::Result;

// == Status ==
/// Outcome of an operation that carries no payload.
///
/// `status` is 0 when the call was skipped (cache disabled or not
/// initialized) and 1 when it executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: u8,
}

impl Status {
    /// The call was a no-op.
    pub const SKIPPED: Status = Status { status: 0 };
    /// The call executed.
    pub const DONE: Status = Status { status: 1 };

    pub fn is_done(&self) -> bool {
        self.status == 1
    }
}

// == Cache Entry ==
/// One `{key, value}` pair as returned by `get_all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
}

// == Backend Trait ==
/// Uniform cache contract.
///
/// Every operation resolves exactly once, with a value or an error. Values
/// cross this boundary as `serde_json::Value`; typed access lives in the
/// facade.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Establishes storage and rebuilds in-memory state from it.
    ///
    /// Safe to call repeatedly; each call replaces all prior state.
    async fn init(&self, config: &CacheConfig) -> Result<()>;

    /// Stores `value` for `ttl_seconds` and returns it.
    ///
    /// Fails with `CacheError::Validation` when `value` is null.
    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<Value>;

    /// Returns the live value for `key`, or `None` when absent or expired.
    ///
    /// An expired record is removed before this returns.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// True when `get` would return a value. Never fails.
    async fn has(&self, key: &str) -> bool;

    /// Deletes `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<Status>;

    /// Deletes every entry whose stored identifier matches `pattern`.
    async fn remove_by_pattern(&self, pattern: &str) -> Result<Status>;

    /// Deletes every entry and leaves an empty store behind.
    async fn clear(&self) -> Result<Status>;

    /// Returns every live entry.
    async fn get_all(&self) -> Result<Vec<CacheEntry>>;

    /// Eagerly removes expired entries, returning how many were dropped.
    ///
    /// Backends whose store expires entries on its own return 0.
    async fn purge_expired(&self) -> Result<usize>;
}
