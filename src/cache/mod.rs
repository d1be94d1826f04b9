//! Cache Module
//!
//! Backend contract, the memory/file/remote engines, and the facade that
//! gates and wraps them.

mod backend;
pub mod codec;
mod facade;
mod file;
mod index;
mod memory;
mod pattern;
#[cfg(feature = "cache-redis")]
mod redis_store;
mod remote;
mod sanitize;
mod stats;


// Re-export public types
pub use backend::{CacheBackend, CacheEntry, Status};
pub use codec::CacheRecord;
pub use facade::Cache;
pub use file::{FileBackend, RECORD_EXTENSION};
pub use index::EntryIndex;
pub use memory::MemoryBackend;
pub use pattern::KeyPattern;
#[cfg(feature = "cache-redis")]
pub use redis_store::RedisStore;
pub use remote::{RemoteBackend, RemoteStore};
pub use sanitize::sanitize_key;
pub use stats::CacheStats;
