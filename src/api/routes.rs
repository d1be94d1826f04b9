//! Route table of the cache service.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    all_handler, clear_handler, delete_handler, get_handler, has_handler, health_handler,
    pattern_handler, set_handler, stats_handler, AppState,
};

/// Builds the service router over `state`.
///
/// Requests are traced and CORS is open to any origin.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/has/:key", get(has_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/pattern/:pattern", delete(pattern_handler))
        .route("/clear", delete(clear_handler))
        .route("/all", get(all_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
