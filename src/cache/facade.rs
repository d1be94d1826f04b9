//! Cache Facade Module
//!
//! Owns the active backend, applies the enable gate and default TTL, and
//! converts between caller types and stored JSON values.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::api::ResponseCache;
use crate::cache::stats::StatsCounter;
#[cfg(feature = "cache-redis")]
use crate::cache::{RedisStore, RemoteBackend};
use crate::cache::{CacheBackend, CacheEntry, CacheStats, FileBackend, MemoryBackend, Status};
use crate::config::{CacheConfig, Engine};
use crate::error::{CacheError, Result};

#[derive(Clone)]
struct Active {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
}

// == Cache ==
/// Entry point for callers.
///
/// Until `init` succeeds, or while the config disables caching, every call is
/// a no-op: mutations return [`Status::SKIPPED`], reads return nothing.
/// Backend errors are never swallowed otherwise.
#[derive(Default)]
pub struct Cache {
    active: RwLock<Option<Active>>,
    stats: StatsCounter,
}

impl Cache {
    /// Creates an uninitialized facade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `backend` with `config`, replacing any previous backend.
    ///
    /// A disabled config installs the backend without initializing it.
    pub async fn init<B>(&self, backend: B, config: CacheConfig) -> Result<()>
    where
        B: CacheBackend + 'static,
    {
        if config.is_enable {
            backend.init(&config).await?;
        }

        info!(
            engine = backend.name(),
            enabled = config.is_enable,
            ttl = config.ttl,
            "Cache initialized"
        );

        *self.active.write().await = Some(Active {
            config,
            backend: Arc::new(backend),
        });
        Ok(())
    }

    /// Builds the engine named by `config.engine` and installs it.
    ///
    /// Remote stores other than Redis go through [`Cache::init`] with a
    /// `RemoteBackend` around the injected client.
    pub async fn init_from_config(&self, config: CacheConfig) -> Result<()> {
        match config.engine {
            Engine::Memory => self.init(MemoryBackend::new(), config).await,
            Engine::File => self.init(FileBackend::new(), config).await,
            Engine::Remote => self.init_redis(config).await,
        }
    }

    #[cfg(feature = "cache-redis")]
    async fn init_redis(&self, config: CacheConfig) -> Result<()> {
        let store = RedisStore::new(&config.remote)?;
        self.init(RemoteBackend::new(Arc::new(store)), config).await
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn init_redis(&self, _config: CacheConfig) -> Result<()> {
        Err(CacheError::Remote(
            "the redis engine needs the cache-redis feature".to_string(),
        ))
    }

    /// Configuration of the installed backend.
    pub async fn config(&self) -> Option<CacheConfig> {
        self.active.read().await.as_ref().map(|a| a.config.clone())
    }

    /// True once initialized with an enabled config.
    pub async fn is_enabled(&self) -> bool {
        self.enabled().await.is_some()
    }

    async fn enabled(&self) -> Option<Active> {
        self.active
            .read()
            .await
            .as_ref()
            .filter(|a| a.config.is_enable)
            .cloned()
    }

    // == Contract ==

    /// Stores `value` under `key`, for `ttl` seconds or the configured default.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<u64>) -> Result<Status>
    where
        T: Serialize + ?Sized,
    {
        let Some(active) = self.enabled().await else {
            return Ok(Status::SKIPPED);
        };

        let value =
            serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let ttl = ttl.unwrap_or(active.config.ttl);

        active.backend.set(key, value, ttl).await?;
        self.stats.record_write();
        Ok(Status::DONE)
    }

    /// Reads `key` as `T`. Absent, expired and disabled all yield `None`.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(active) = self.enabled().await else {
            return Ok(None);
        };

        let value = active.backend.get(key).await?;

        match value {
            Some(value) => {
                self.stats.record_hit();
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))
            }
            None => {
                self.stats.record_miss();
                debug!(key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Raw JSON read, skipping typed conversion.
    pub async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        self.get::<Value>(key).await
    }

    pub async fn has(&self, key: &str) -> bool {
        match self.enabled().await {
            Some(active) => active.backend.has(key).await,
            None => false,
        }
    }

    pub async fn remove(&self, key: &str) -> Result<Status> {
        match self.enabled().await {
            Some(active) => active.backend.remove(key).await,
            None => Ok(Status::SKIPPED),
        }
    }

    /// Removes every entry whose stored identifier matches the regex `pattern`.
    pub async fn remove_by_pattern(&self, pattern: &str) -> Result<Status> {
        match self.enabled().await {
            Some(active) => active.backend.remove_by_pattern(pattern).await,
            None => Ok(Status::SKIPPED),
        }
    }

    pub async fn clear(&self) -> Result<Status> {
        match self.enabled().await {
            Some(active) => active.backend.clear().await,
            None => Ok(Status::SKIPPED),
        }
    }

    pub async fn get_all(&self) -> Result<Vec<CacheEntry>> {
        match self.enabled().await {
            Some(active) => active.backend.get_all().await,
            None => Ok(Vec::new()),
        }
    }

    /// Eagerly drops expired entries. Returns 0 when disabled.
    pub async fn purge_expired(&self) -> Result<usize> {
        match self.enabled().await {
            Some(active) => active.backend.purge_expired().await,
            None => Ok(0),
        }
    }

    /// Snapshot of the hit/miss/write counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Response-cache state for `axum::middleware::from_fn_with_state`.
    ///
    /// Responses are keyed by `prefix` plus the request path and query and
    /// kept for `ttl` seconds.
    pub fn middleware(self: &Arc<Self>, ttl: u64, prefix: impl Into<String>) -> ResponseCache {
        ResponseCache::new(Arc::clone(self), ttl, prefix)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Foo {
        bar: String,
    }

    async fn file_cache(dir: &TempDir) -> Cache {
        let cache = Cache::new();
        cache
            .init_from_config(CacheConfig::file(dir.path()))
            .await
            .unwrap();
        cache
    }

    #[tokio::test]
    async fn test_uninitialized_is_noop() {
        let cache = Cache::new();

        assert_eq!(
            cache.set("key", &Foo { bar: "baz".into() }, None).await.unwrap(),
            Status::SKIPPED
        );
        assert_eq!(cache.get::<Foo>("key").await.unwrap(), None);
        assert!(!cache.has("key").await);
        assert_eq!(cache.remove("key").await.unwrap(), Status::SKIPPED);
        assert_eq!(cache.clear().await.unwrap(), Status::SKIPPED);
        assert!(cache.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_leaves_storage_untouched() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir).await;
        cache.set("kept", "value", None).await.unwrap();

        cache
            .init_from_config(CacheConfig::file(dir.path()).enabled(false))
            .await
            .unwrap();

        assert_eq!(cache.set("kept", "other", None).await.unwrap(), Status::SKIPPED);
        assert_eq!(cache.remove("kept").await.unwrap(), Status::SKIPPED);
        assert_eq!(
            cache.remove_by_pattern("kept").await.unwrap(),
            Status::SKIPPED
        );
        assert_eq!(cache.clear().await.unwrap(), Status::SKIPPED);
        assert!(!cache.is_enabled().await);

        cache
            .init_from_config(CacheConfig::file(dir.path()))
            .await
            .unwrap();
        assert_eq!(
            cache.get::<String>("kept").await.unwrap(),
            Some("value".to_string())
        );
    }

    #[tokio::test]
    async fn test_disabled_does_not_create_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("never");
        let cache = Cache::new();

        cache
            .init_from_config(CacheConfig::file(&root).enabled(false))
            .await
            .unwrap();

        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir).await;

        assert_eq!(cache.set("foo", "bar", None).await.unwrap(), Status::DONE);
        assert_eq!(
            cache.set("foo1", &Foo { bar: "baz".into() }, None).await.unwrap(),
            Status::DONE
        );

        assert_eq!(
            cache.get::<String>("foo").await.unwrap(),
            Some("bar".to_string())
        );
        assert_eq!(
            cache.get::<Foo>("foo1").await.unwrap(),
            Some(Foo { bar: "baz".into() })
        );
        assert_eq!(
            cache.get_value("foo1").await.unwrap(),
            Some(serde_json::json!({"bar": "baz"}))
        );
    }

    #[tokio::test]
    async fn test_wrong_type_is_deserialization_error() {
        let cache = Cache::new();
        cache.init_from_config(CacheConfig::memory()).await.unwrap();

        cache.set("n", &42, None).await.unwrap();
        let result = cache.get::<Foo>("n").await;
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_unserializable_value() {
        let cache = Cache::new();
        cache.init_from_config(CacheConfig::memory()).await.unwrap();

        let mut value = HashMap::new();
        value.insert((1u8, 2u8), "tuple keys are not JSON object keys");

        let result = cache.set("bad", &value, None).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_null_value_rejected() {
        let cache = Cache::new();
        cache.init_from_config(CacheConfig::memory()).await.unwrap();

        let result = cache.set("none", &Option::<u8>::None, None).await;
        assert!(matches!(result, Err(CacheError::Validation(_))));
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let cache = Cache::new();
        cache
            .init_from_config(CacheConfig::memory().with_ttl(1))
            .await
            .unwrap();

        cache.set("short", "lived", None).await.unwrap();
        cache.set("long", "lived", Some(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.get::<String>("short").await.unwrap(), None);
        assert!(!cache.has("short").await);
        assert!(cache.has("long").await);
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let cache = Cache::new();
        cache.init_from_config(CacheConfig::memory()).await.unwrap();

        cache.set("a", &1, None).await.unwrap();
        cache.get::<u8>("a").await.unwrap();
        cache.get::<u8>("missing").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[cfg(not(feature = "cache-redis"))]
    #[tokio::test]
    async fn test_redis_engine_needs_feature() {
        let cache = Cache::new();
        let result = cache
            .init_from_config(CacheConfig::remote(Default::default()))
            .await;

        assert!(matches!(result, Err(CacheError::Remote(_))));
        assert!(!cache.is_enabled().await);
    }

    #[cfg(feature = "cache-redis")]
    #[tokio::test]
    async fn test_disabled_redis_engine_does_not_connect() {
        let cache = Cache::new();
        let remote = crate::config::RemoteConfig {
            port: 1,
            ..Default::default()
        };
        cache
            .init_from_config(CacheConfig::remote(remote).enabled(false))
            .await
            .unwrap();

        assert_eq!(cache.config().await.unwrap().engine, Engine::Remote);
        assert_eq!(cache.set("k", &1, None).await.unwrap(), Status::SKIPPED);
    }

    #[tokio::test]
    async fn test_reinit_swaps_engine() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir).await;
        cache.set("on_disk", &1, None).await.unwrap();

        cache.init_from_config(CacheConfig::memory()).await.unwrap();
        assert_eq!(cache.get::<u8>("on_disk").await.unwrap(), None);
        assert_eq!(cache.config().await.unwrap().engine, Engine::Memory);
    }
}
