//! Configuration Module
//!
//! Cache configuration handed to `init`, plus the service configuration
//! loaded from environment variables.

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// Default TTL in seconds applied when `set` is called without one.
pub const DEFAULT_TTL: u64 = 60;

/// Default storage directory of the file engine.
pub const DEFAULT_FILE_PATH: &str = "storage/cache";

/// Default Redis endpoint of the remote engine.
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";
pub const DEFAULT_REMOTE_PORT: u16 = 6379;

/// Storage engine selected by `Cache::init_from_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Memory,
    #[default]
    File,
    /// Redis through the `cache-redis` feature
    #[serde(alias = "redis")]
    Remote,
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Engine::Memory),
            "file" => Ok(Engine::File),
            "remote" | "redis" => Ok(Engine::Remote),
            other => Err(format!("unknown cache engine '{}'", other)),
        }
    }
}

/// File engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Directory holding one `<key>.json` record per entry
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FILE_PATH),
        }
    }
}

/// Remote engine settings.
///
/// The connection fields are used when `init_from_config` builds the Redis
/// client; an injected `RemoteStore` only reads `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Logical database index
    #[serde(alias = "database")]
    pub db: i64,
    /// Namespace prepended to every key sent to the store
    pub prefix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REMOTE_HOST.to_string(),
            port: DEFAULT_REMOTE_PORT,
            password: None,
            db: 0,
            prefix: String::new(),
        }
    }
}

/// Cache configuration supplied once to `init`.
///
/// Every field is defaulted, so partial documents like `{"isEnable": false}`
/// deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// When false every facade call is a no-op returning status 0
    pub is_enable: bool,
    /// Default TTL in seconds
    pub ttl: u64,
    /// Engine built by `Cache::init_from_config`
    pub engine: Engine,
    pub file: FileConfig,
    pub remote: RemoteConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            is_enable: true,
            ttl: DEFAULT_TTL,
            engine: Engine::default(),
            file: FileConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Convenience constructor for a file engine rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            engine: Engine::File,
            file: FileConfig { path: path.into() },
            ..Self::default()
        }
    }

    /// Convenience constructor for the remote engine.
    pub fn remote(remote: RemoteConfig) -> Self {
        Self {
            engine: Engine::Remote,
            remote,
            ..Self::default()
        }
    }

    /// Convenience constructor for the memory engine.
    pub fn memory() -> Self {
        Self {
            engine: Engine::Memory,
            ..Self::default()
        }
    }

    /// Returns a copy with the enable gate set to `is_enable`.
    pub fn enabled(mut self, is_enable: bool) -> Self {
        self.is_enable = is_enable;
        self
    }

    /// Returns a copy with the default TTL set to `ttl` seconds.
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache contract configuration
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Expired-record sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENABLED` - Enable gate (default: true)
    /// - `CACHE_TTL` - Default TTL in seconds (default: 60)
    /// - `CACHE_ENGINE` - `file`, `memory` or `redis` (default: file)
    /// - `CACHE_PATH` - File engine directory (default: storage/cache)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB` - Remote
    ///   engine endpoint (default: 127.0.0.1:6379, no password, db 0)
    /// - `CACHE_PREFIX` - Remote engine key namespace (default: empty)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            is_enable: parse_env("CACHE_ENABLED").unwrap_or(defaults.is_enable),
            ttl: parse_env("CACHE_TTL").unwrap_or(defaults.ttl),
            engine: parse_env("CACHE_ENGINE").unwrap_or(defaults.engine),
            file: FileConfig {
                path: env::var("CACHE_PATH")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.file.path),
            },
            remote: RemoteConfig {
                host: env::var("REDIS_HOST")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .unwrap_or(defaults.remote.host),
                port: parse_env("REDIS_PORT").unwrap_or(defaults.remote.port),
                password: env::var("REDIS_PASSWORD").ok().filter(|v| !v.is_empty()),
                db: parse_env("REDIS_DB").unwrap_or(defaults.remote.db),
                prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.remote.prefix),
            },
        };

        Self {
            cache,
            server_port: parse_env("SERVER_PORT").unwrap_or(3000),
            sweep_interval: parse_env("SWEEP_INTERVAL").unwrap_or(0),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            sweep_interval: 0,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
