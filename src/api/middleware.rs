//! Response Cache Middleware
//!
//! Serves repeated GET requests from the cache and stores fresh successful
//! responses on the way out.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/users", get(list_users))
//!     .layer(middleware::from_fn_with_state(
//!         cache.middleware(30, "users:"),
//!         response_cache,
//!     ));
//! ```

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::Cache;

/// Header telling clients whether the response came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Largest response body stored by default, in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// == Response Cache State ==
/// Middleware state: the cache plus the TTL, key prefix and body cap to use.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Arc<Cache>,
    ttl: u64,
    prefix: String,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(cache: Arc<Cache>, ttl: u64, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            ttl,
            prefix: prefix.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Responses whose body may exceed `bytes` pass through uncached.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Cache key for a request: prefix followed by path and query.
    pub fn key_for(&self, uri: &Uri) -> String {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        format!("{}{}", self.prefix, target)
    }
}

// == Cached Response ==
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedResponse {
    status: u16,
    content_type: Option<String>,
    body: String,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        if let Some(value) = self
            .content_type
            .and_then(|ct| HeaderValue::from_str(&ct).ok())
        {
            headers.insert(CONTENT_TYPE, value);
        }
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
        response
    }
}

// == Middleware ==
/// Interceptor for `axum::middleware::from_fn_with_state`.
///
/// Only GET requests take part. Cache failures are logged and the request
/// proceeds uncached; they never fail the request. A body is buffered only
/// when its size is known up front and within the cap, so streamed or
/// oversized responses are forwarded untouched.
pub async fn response_cache(
    State(state): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if *request.method() != Method::GET || !state.cache.is_enabled().await {
        return next.run(request).await;
    }

    let key = state.key_for(request.uri());
    match state.cache.get::<CachedResponse>(&key).await {
        Ok(Some(cached)) => {
            debug!(key = %key, "Serving response from cache");
            return cached.into_response();
        }
        Ok(None) => {}
        Err(e) => warn!(key = %key, error = %e, "Cached response unreadable"),
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let within_cap = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= state.max_body_bytes as u64);
    if !within_cap {
        debug!(key = %key, "Response body over the cache limit, not cached");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match std::str::from_utf8(&bytes) {
        Ok(text) => {
            let cached = CachedResponse {
                status: parts.status.as_u16(),
                content_type: parts
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: text.to_string(),
            };
            if let Err(e) = state.cache.set(&key, &cached, Some(state.ttl)).await {
                warn!(key = %key, error = %e, "Failed to cache response");
            }
        }
        Err(_) => debug!(key = %key, "Binary response body not cached"),
    }

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}
