//! Memory Backend Module
//!
//! In-process cache engine: a HashMap of values with absolute expirations.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::codec::{current_timestamp_ms, expire_at};
use crate::cache::{CacheBackend, CacheEntry, KeyPattern, Status};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Memory Entry ==
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    /// Expiration timestamp (Unix milliseconds)
    expire_at: u64,
}

impl MemoryEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expire_at < now_ms
    }
}

// == Memory Backend ==
/// HashMap-backed cache engine.
///
/// Keys are used verbatim. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<Option<HashMap<String, MemoryEntry>>>,
}

impl MemoryBackend {
    /// Creates an uninitialized backend. Call `init` before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.as_ref().map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self, _config: &CacheConfig) -> Result<()> {
        *self.entries.write().await = Some(HashMap::new());
        info!("Memory cache initialized");
        Ok(())
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<Value> {
        if value.is_null() {
            return Err(CacheError::Validation(format!(
                "cannot cache a null value for key '{}'",
                key
            )));
        }

        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.clone(),
                expire_at: expire_at(current_timestamp_ms(), ttl_seconds),
            },
        );
        debug!(key, ttl = ttl_seconds, "Stored cache entry");
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(current_timestamp_ms()) => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => {}
        }

        entries.remove(key);
        debug!(key, "Cache entry expired");
        Ok(None)
    }

    async fn has(&self, key: &str) -> bool {
        let guard = self.entries.read().await;
        guard
            .as_ref()
            .and_then(|entries| entries.get(key))
            .is_some_and(|entry| !entry.is_expired(current_timestamp_ms()))
    }

    async fn remove(&self, key: &str) -> Result<Status> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;
        entries.remove(key);
        Ok(Status::DONE)
    }

    async fn remove_by_pattern(&self, pattern: &str) -> Result<Status> {
        let pattern = KeyPattern::new(pattern)?;

        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        debug!(
            pattern = pattern.as_str(),
            removed = before - entries.len(),
            "Removed cache entries by pattern"
        );
        Ok(Status::DONE)
    }

    async fn clear(&self) -> Result<Status> {
        let mut guard = self.entries.write().await;
        guard.as_mut().ok_or(CacheError::NotInitialized)?.clear();
        Ok(Status::DONE)
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let now = current_timestamp_ms();
        entries.retain(|_, entry| !entry.is_expired(now));

        let mut all: Vec<CacheEntry> = entries
            .iter()
            .map(|(key, entry)| CacheEntry {
                key: key.clone(),
                value: entry.value.clone(),
            })
            .collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(CacheError::NotInitialized)?;

        let now = current_timestamp_ms();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}
