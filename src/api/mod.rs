//! API Module
//!
//! HTTP handlers, routing, and the response-cache middleware.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /has/:key` - Check whether a key is live
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /pattern/:pattern` - Delete keys matching a regex
//! - `DELETE /clear` - Delete everything
//! - `GET /all` - List live entries
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{
    response_cache, ResponseCache, CACHE_STATUS_HEADER, DEFAULT_MAX_BODY_BYTES,
};
pub use routes::create_router;
