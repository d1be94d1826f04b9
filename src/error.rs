//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache backend and the facade.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected input, e.g. a null value passed to `set`
    #[error("Validation error: {0}")]
    Validation(String),

    /// Value could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored record or payload could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Storage medium failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend used before `init`
    #[error("Cache backend is not initialized")]
    NotInitialized,

    /// Pattern passed to `remove_by_pattern` does not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Failure reported by the remote store client
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl CacheError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) | CacheError::InvalidPattern(_) => StatusCode::BAD_REQUEST,
            CacheError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_)
            | CacheError::Deserialization(_)
            | CacheError::Io { .. }
            | CacheError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
