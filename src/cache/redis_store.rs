//! Redis Store Module
//!
//! [`RemoteStore`] over a Redis server. The connection is opened on first
//! use, so building the store for a disabled cache never touches the network.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, IntoConnectionInfo, RedisError};
use tokio::sync::OnceCell;
use tracing::info;

use crate::cache::RemoteStore;
use crate::config::RemoteConfig;
use crate::error::{CacheError, Result};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 100;

fn remote_error(e: RedisError) -> CacheError {
    CacheError::Remote(e.to_string())
}

/// Redis client implementing the remote engine's command set.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Builds a client for the endpoint in `config`. Does not connect.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::open(connection_info(config)?).map_err(remote_error)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .get_or_try_init(|| async {
                let manager = self
                    .client
                    .get_connection_manager()
                    .await
                    .map_err(remote_error)?;
                info!("Connected to Redis");
                Ok::<_, CacheError>(manager)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, payload: String, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        // PX rejects 0, the shortest lifetime it accepts is 1ms
        let ttl_ms = ttl_seconds.saturating_mul(1000).max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(remote_error)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(remote_error)?;
        Ok(count > 0)
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_str());
        }
        cmd.query_async(&mut conn).await.map_err(remote_error)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", escape_glob(prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(remote_error)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

fn connection_info(config: &RemoteConfig) -> Result<ConnectionInfo> {
    let mut info = format!("redis://{}:{}", config.host, config.port)
        .into_connection_info()
        .map_err(remote_error)?;
    info.redis.db = config.db;
    info.redis.password = config.password.clone();
    Ok(info)
}

/// Escapes the characters SCAN MATCH treats as glob syntax.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
