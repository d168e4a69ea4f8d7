use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use crate::metrics::{INDEXED_CHUNKS, TRACKED_CLIENTS};
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    // gauges that are cheaper to sample than to keep in sync
    TRACKED_CLIENTS.set(state.quota.tracked_clients() as f64);
    INDEXED_CHUNKS.set(state.store.count() as f64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
