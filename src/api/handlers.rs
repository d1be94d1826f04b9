//! API Handlers
//!
//! HTTP request handlers for each cache service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::cache::{Cache, Status};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    EntriesResponse, GetResponse, HasResponse, HealthResponse, SetRequest, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache facade
    pub cache: Arc<Cache>,
}

impl AppState {
    /// Creates a new AppState around an existing facade.
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the configured engine and initializes it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let cache = Cache::new();
        cache.init_from_config(config.cache.clone()).await?;
        Ok(Self::new(Arc::new(cache)))
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<Status>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::Validation(error_msg));
    }

    let status = state.cache.set(&req.key, &req.value, req.ttl).await?;
    Ok(Json(status))
}

/// Handler for GET /get/:key
///
/// Returns 404 when the key is absent or expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    match state.cache.get_value(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Key not found: {}", key) })),
        )
            .into_response()),
    }
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<HasResponse> {
    let exists = state.cache.has(&key).await;
    Json(HasResponse::new(key, exists))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Status>> {
    Ok(Json(state.cache.remove(&key).await?))
}

/// Handler for DELETE /pattern/:pattern
///
/// The path segment is a regex matched against stored identifiers.
pub async fn pattern_handler(
    State(state): State<AppState>,
    Path(pattern): Path<String>,
) -> Result<Json<Status>> {
    Ok(Json(state.cache.remove_by_pattern(&pattern).await?))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<Status>> {
    Ok(Json(state.cache.clear().await?))
}

/// Handler for GET /all
pub async fn all_handler(State(state): State<AppState>) -> Result<Json<EntriesResponse>> {
    let entries = state.cache.get_all().await?;
    Ok(Json(EntriesResponse::new(entries)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let enabled = state.cache.is_enabled().await;
    let stats = state.cache.stats();
    Json(StatsResponse::new(enabled, &stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
