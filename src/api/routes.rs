//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{get_query, health, post_query, ready, render_metrics, root, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(render_metrics))
        // Key-based routing
        .route("/query", get(get_query).post(post_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
