//! Remote Backend Module
//!
//! Forwards the cache contract to an external key-value store. The store
//! client is injected through [`RemoteStore`]; TTL enforcement is left to the
//! store itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheBackend, CacheEntry, KeyPattern, Status};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Remote Store ==
/// Minimal command set the remote backend needs from a store client.
///
/// Implementations report client failures as `CacheError::Remote`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Checks connectivity.
    async fn ping(&self) -> Result<()>;

    /// Stores `payload` under `key`, expiring after `ttl_seconds`.
    async fn set_ex(&self, key: &str, payload: String, ttl_seconds: u64) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Deletes `keys`, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<usize>;

    /// Lists every live key starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

// == Remote Backend ==
/// Cache engine backed by a [`RemoteStore`].
///
/// Every key is namespaced with the configured prefix. Pattern removal
/// matches against the namespaced key, which is what the store shows.
pub struct RemoteBackend {
    store: Arc<dyn RemoteStore>,
    prefix: RwLock<Option<String>>,
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            prefix: RwLock::new(None),
        }
    }

    async fn prefix(&self) -> Result<String> {
        self.prefix
            .read()
            .await
            .clone()
            .ok_or(CacheError::NotInitialized)
    }

    async fn namespaced(&self, key: &str) -> Result<String> {
        Ok(format!("{}{}", self.prefix().await?, key))
    }
}

#[async_trait]
impl CacheBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn init(&self, config: &CacheConfig) -> Result<()> {
        self.store.ping().await?;
        *self.prefix.write().await = Some(config.remote.prefix.clone());
        info!(prefix = %config.remote.prefix, "Remote cache initialized");
        Ok(())
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<Value> {
        if value.is_null() {
            return Err(CacheError::Validation(format!(
                "cannot cache a null value for key '{}'",
                key
            )));
        }

        let payload =
            serde_json::to_string(&value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let key = self.namespaced(key).await?;
        self.store.set_ex(&key, payload, ttl_seconds).await?;
        debug!(key = %key, ttl = ttl_seconds, "Stored remote cache entry");
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = self.namespaced(key).await?;
        match self.store.get(&key).await? {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn has(&self, key: &str) -> bool {
        let Ok(key) = self.namespaced(key).await else {
            return false;
        };
        self.store.exists(&key).await.unwrap_or(false)
    }

    async fn remove(&self, key: &str) -> Result<Status> {
        let key = self.namespaced(key).await?;
        self.store.del(&[key]).await?;
        Ok(Status::DONE)
    }

    async fn remove_by_pattern(&self, pattern: &str) -> Result<Status> {
        let pattern = KeyPattern::new(pattern)?;
        let prefix = self.prefix().await?;

        let matches: Vec<String> = self
            .store
            .keys(&prefix)
            .await?
            .into_iter()
            .filter(|key| pattern.is_match(key))
            .collect();

        if !matches.is_empty() {
            let removed = self.store.del(&matches).await?;
            debug!(pattern = pattern.as_str(), removed, "Removed remote cache entries by pattern");
        }
        Ok(Status::DONE)
    }

    async fn clear(&self) -> Result<Status> {
        let prefix = self.prefix().await?;
        let keys = self.store.keys(&prefix).await?;
        if !keys.is_empty() {
            self.store.del(&keys).await?;
        }
        Ok(Status::DONE)
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>> {
        let prefix = self.prefix().await?;
        let mut keys = self.store.keys(&prefix).await?;
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            // Keys can expire between listing and reading
            let Some(payload) = self.store.get(&key).await? else {
                continue;
            };
            let value = serde_json::from_str(&payload)
                .map_err(|e| CacheError::Deserialization(e.to_string()))?;
            let key = key.strip_prefix(prefix.as_str()).unwrap_or(&key).to_string();
            entries.push(CacheEntry { key, value });
        }
        Ok(entries)
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}
