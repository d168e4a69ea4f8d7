use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::error::AppError;
use crate::metrics::INDEXED_CHUNKS;

// Chunk held in the vector store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

#[derive(Clone, Debug)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Value,
}

// Create a chunk id (hash of namespace + source + position + text)
pub fn chunk_id(namespace: &str, source: &str, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace);
    hasher.update([0]);
    hasher.update(source);
    hasher.update([0]);
    hasher.update(index.to_le_bytes());
    hasher.update(text);
    format!("{:x}", hasher.finalize())
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// In-memory vector store, brute-force cosine search over every chunk.
#[derive(Default)]
pub struct VectorStore {
    chunks: DashMap<String, StoredChunk>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, chunks: impl IntoIterator<Item = (String, StoredChunk)>) -> usize {
        let mut added = 0;
        for (id, chunk) in chunks {
            self.chunks.insert(id, chunk);
            added += 1;
        }
        INDEXED_CHUNKS.set(self.chunks.len() as f64);
        added
    }

    pub fn search(&self, query: &[f32], k: usize, namespace: Option<&str>) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .chunks
            .iter()
            .filter(|entry| match namespace {
                Some(ns) => entry.metadata.get("namespace").and_then(Value::as_str) == Some(ns),
                None => true,
            })
            .map(|entry| SearchHit {
                id: entry.key().clone(),
                score: cosine_sim(query, &entry.embedding),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }

    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    pub fn clear(&self) {
        self.chunks.clear();
        INDEXED_CHUNKS.set(0.0);
    }

    /// Write the whole index to `path` as JSON.
    ///
    /// Goes through a sibling temp file and a rename, so a crash mid-write
    /// leaves the previous snapshot in place.
    pub async fn save(&self, path: &Path) -> Result<(), AppError> {
        let snapshot = Snapshot {
            chunks: self
                .chunks
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| AppError::Storage(format!("encode snapshot: {}", e)))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::Storage(format!("rename to {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Load a snapshot written by [`VectorStore::save`], a missing file is an empty index.
    pub async fn load(&self, path: &Path) -> Result<usize, AppError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(AppError::Storage(format!("read {}: {}", path.display(), e)));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Storage(format!("decode {}: {}", path.display(), e)))?;
        Ok(self.add(snapshot.chunks))
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    chunks: HashMap<String, StoredChunk>,
}
