//! Admin API key guard for the ingest, query and index routes.
//!
//! The configured key is hashed once at startup. Each request hashes the
//! `X-API-KEY` header and compares digests in constant time.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());

    if !bool::from(provided_hash.as_slice().ct_eq(state.api_key_hash.as_slice())) {
        tracing::debug!(path = %req.uri().path(), "rejected request with bad api key");
        return AppError::Unauthorized.into_response();
    }

    next.run(req).await
}
