use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Args;
use crate::error::AppError;
use crate::llm::LlmClient;
use crate::rate_limit::QuotaTracker;
use crate::store::VectorStore;

// app's shared state
pub struct AppState {
    pub llm: LlmClient,
    pub store: VectorStore,
    pub quota: Arc<QuotaTracker>,
    pub api_key_hash: Vec<u8>, // sha256 of the admin key
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub index_path: Option<PathBuf>, // json snapshot of the store
    persist_lock: Mutex<()>,
}

impl AppState {
    pub fn new(llm: LlmClient, quota: Arc<QuotaTracker>, admin_api_key: &str) -> Self {
        Self {
            llm,
            store: VectorStore::new(),
            quota,
            api_key_hash: Sha256::digest(admin_api_key.as_bytes()).to_vec(),
            chunk_size: 400,
            chunk_overlap: 80,
            top_k: 4,
            index_path: None,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn with_index_path(mut self, index_path: Option<PathBuf>) -> Self {
        self.index_path = index_path;
        self
    }

    /// Load the snapshot, if one is configured, returns how many chunks came back.
    pub async fn restore_index(&self) -> Result<usize, AppError> {
        match &self.index_path {
            Some(path) => self.store.load(path).await,
            None => Ok(0),
        }
    }

    // Rewrite the snapshot after the store changed, no-op without a path
    pub async fn persist_index(&self) -> Result<(), AppError> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;
        self.store.save(path).await.inspect_err(|e| {
            tracing::error!(path = %path.display(), "failed to persist index: {}", e);
        })
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn from_args(args: &Args) -> Result<Self, AppError> {
        args.validate()?;

        let quota = Arc::new(QuotaTracker::new(args.quota_config())?);
        let llm = LlmClient::new(
            &args.llm_base_url,
            args.openai_api_key.clone(),
            args.embedding_model.clone(),
            args.llm_model.clone(),
            args.request_timeout(),
        )?
        .with_embed_batch(args.embed_batch_size);

        Ok(Self::new(llm, quota, &args.admin_api_key)
            .with_chunking(args.chunk_size, args.chunk_overlap)
            .with_top_k(args.top_k)
            .with_index_path(args.index_path.clone()))
    }
}
