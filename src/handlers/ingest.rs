use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::chunk::split_text_words;
use crate::error::AppError;
use crate::models::{IngestRequest, IngestResponse};
use crate::state::AppState;
use crate::store::{StoredChunk, chunk_id};

pub(super) fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

// Embed the chunks, store them and refresh the snapshot
pub(super) async fn embed_and_store(
    state: &AppState,
    texts: Vec<String>,
    entries: Vec<(String, Value)>,
) -> Result<usize, AppError> {
    let embeddings = state.llm.embed(&texts).await?;

    let indexed = state.store.add(
        entries
            .into_iter()
            .zip(texts)
            .zip(embeddings)
            .map(|(((id, metadata), text), embedding)| {
                (id, StoredChunk { text, embedding, metadata })
            }),
    );

    state.persist_index().await?;
    Ok(indexed)
}

pub async fn ingest_text_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if payload.texts.is_empty() {
        return Err(AppError::BadRequest("No texts provided.".to_string()));
    }

    let timestamp = now_timestamp();

    let mut texts = Vec::new();
    let mut entries = Vec::new();
    for (doc_idx, doc) in payload.texts.iter().enumerate() {
        for (chunk_idx, chunk) in split_text_words(doc, state.chunk_size, state.chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let id = chunk_id(&payload.namespace, &doc_idx.to_string(), chunk_idx, &chunk);
            let metadata = json!({
                "doc_id": doc_idx,
                "chunk_id": chunk_idx,
                "namespace": payload.namespace,
                "timestamp": timestamp,
            });
            texts.push(chunk);
            entries.push((id, metadata));
        }
    }

    let indexed = embed_and_store(&state, texts, entries).await?;

    tracing::info!(namespace = %payload.namespace, indexed, "ingested texts");

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        indexed_chunks: indexed,
        file: None,
    }))
}
