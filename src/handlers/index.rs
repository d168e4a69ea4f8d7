use axum::{Json, extract::State};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::IndexInfo;
use crate::state::AppState;

pub async fn index_info_handler(State(state): State<Arc<AppState>>) -> Json<IndexInfo> {
    Json(IndexInfo {
        status: "ok".to_string(),
        count: state.store.count(),
    })
}

pub async fn index_clear_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dropped = state.store.count();
    state.store.clear();
    state.persist_index().await?;
    tracing::info!(dropped, "vector index cleared");
    Ok(Json(serde_json::json!({ "status": "cleared" })))
}
