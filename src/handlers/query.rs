use axum::{Json, extract::State};
use std::sync::Arc;
use std::time::Instant;

use crate::error::AppError;
use crate::metrics::QUERY_LATENCY;
use crate::models::{QueryRequest, QueryResponse, RetrievedChunk};
use crate::state::AppState;

const PREVIEW_CHARS: usize = 400;

pub const NO_ANSWER: &str = "I don't know based on provided documents.";

const SYSTEM_PROMPT: &str = "You are an assistant that answers using only the provided context. \
     If the answer can't be found, say 'I don't know based on provided documents'.";

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if payload.query.trim().is_empty() {
        return Err(AppError::BadRequest("Empty query.".to_string()));
    }

    let start_time = Instant::now();
    let k = payload.k.filter(|k| *k > 0).unwrap_or(state.top_k);

    let query_vec = state
        .llm
        .embed(std::slice::from_ref(&payload.query))
        .await?
        .pop()
        .ok_or_else(|| AppError::Upstream("no embedding returned for query".to_string()))?;

    let hits = state.store.search(&query_vec, k, payload.namespace.as_deref());
    if hits.is_empty() {
        return Ok(Json(QueryResponse {
            answer: NO_ANSWER.to_string(),
            retrieved: Vec::new(),
        }));
    }

    let retrieved: Vec<RetrievedChunk> = hits
        .into_iter()
        .map(|hit| RetrievedChunk {
            text_preview: hit.text.chars().take(PREVIEW_CHARS).collect(),
            metadata: hit.metadata,
        })
        .collect();

    let context = retrieved
        .iter()
        .map(|h| h.text_preview.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    let user_prompt = format!(
        "Question: {}\n\nContext:\n{}\n\nAnswer:",
        payload.query, context
    );

    let answer = state.llm.chat(SYSTEM_PROMPT, &user_prompt).await?;

    QUERY_LATENCY.observe(start_time.elapsed().as_secs_f64());
    tracing::debug!(hits = retrieved.len(), "query answered");

    Ok(Json(QueryResponse { answer, retrieved }))
}
