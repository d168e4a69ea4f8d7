use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::require_api_key;
use crate::handlers::{
    health_handler, index_clear_handler, index_info_handler, ingest_text_handler,
    ingest_upload_handler, metrics_handler, query_handler,
};
use crate::middleware::enforce_quota;
use crate::state::AppState;

// Layers run outside-in: cors, quota, then the api key guard on protected routes
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/query", post(query_handler))
        .route("/ingest/text", post(ingest_text_handler))
        .route("/ingest/upload", post(ingest_upload_handler))
        .route("/index/info", get(index_info_handler))
        .route("/index/clear", post(index_clear_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.quota),
            enforce_quota,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
