//! Mini Cache - A pluggable key-value cache
//!
//! One contract (`set`, `get`, `has`, `remove`, `remove_by_pattern`, `clear`,
//! `get_all`) over memory, file and remote backends, with time-based lazy
//! expiration and a response-cache middleware for axum.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheBackend, Status};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
