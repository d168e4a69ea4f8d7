use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::ingest::{embed_and_store, now_timestamp};
use crate::chunk::split_text_words;
use crate::error::AppError;
use crate::models::IngestResponse;
use crate::state::AppState;
use crate::store::chunk_id;

#[derive(Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub namespace: Option<String>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Multipart error: {}", e))
}

// Pull plain text out of an uploaded .pdf or .txt file
async fn extract_text(filename: &str, content: Vec<u8>) -> Result<String, AppError> {
    if filename.ends_with(".pdf") {
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&content))
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read PDF: {}", e)))?
            .map_err(|e| AppError::BadRequest(format!("Could not read PDF: {}", e)))
    } else if filename.ends_with(".txt") {
        Ok(String::from_utf8_lossy(&content).into_owned())
    } else {
        Err(AppError::BadRequest(
            "Unsupported file type. Use .pdf or .txt".to_string(),
        ))
    }
}

pub async fn ingest_upload_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let mut namespace = params.namespace.unwrap_or_else(|| "default".to_string());
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_lowercase();
                let content = field.bytes().await.map_err(multipart_error)?;
                upload = Some((filename, content.to_vec()));
            }
            "namespace" => {
                namespace = field.text().await.map_err(multipart_error)?;
            }
            other => tracing::trace!("ignoring multipart field {}", other),
        }
    }

    let (filename, content) =
        upload.ok_or_else(|| AppError::BadRequest("No file uploaded.".to_string()))?;

    let text = extract_text(&filename, content).await?;
    if text.trim().is_empty() {
        return Err(AppError::BadRequest("No text extracted from file.".to_string()));
    }

    let timestamp = now_timestamp();
    let chunks = split_text_words(&text, state.chunk_size, state.chunk_overlap);
    let entries = chunks
        .iter()
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let id = chunk_id(&namespace, &filename, chunk_idx, chunk);
            let metadata = json!({
                "filename": filename,
                "chunk_id": chunk_idx,
                "namespace": namespace,
                "timestamp": timestamp,
            });
            (id, metadata)
        })
        .collect();

    let indexed = embed_and_store(&state, chunks, entries).await?;

    tracing::info!(file = %filename, namespace = %namespace, indexed, "ingested upload");

    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        indexed_chunks: indexed,
        file: Some(filename),
    }))
}
