use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::rate_limit::QuotaConfig;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "rag-gateway")]
#[command(about = "Retrieval-augmented query service with per-client daily quotas")]
pub struct Args {
    // Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    // Guarded requests allowed per client per window
    #[arg(long, env = "MAX_DAILY_REQUESTS", default_value_t = 200)]
    pub daily_limit: u32,

    // Only paths starting with this prefix consume quota
    #[arg(long, env = "GUARDED_PREFIX", default_value = "/query")]
    pub guarded_prefix: String,

    // Quota window in seconds
    #[arg(long, env = "QUOTA_WINDOW_SECS", default_value_t = 86_400)]
    pub quota_window_secs: u64,

    // How often stale quota records are dropped
    #[arg(long, env = "EVICTION_INTERVAL_SECS", default_value_t = 3_600)]
    pub eviction_interval_secs: u64,

    #[arg(long, env = "ADMIN_API_KEY", default_value = "adminsecret", hide_env_values = true)]
    pub admin_api_key: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    // Base url of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    // Words per chunk
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 400)]
    pub chunk_size: usize,

    // Words shared between neighbouring chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 80)]
    pub chunk_overlap: usize,

    #[arg(long, env = "TOP_K", default_value_t = 4)]
    pub top_k: usize,

    // Inputs per embeddings request
    #[arg(long, env = "EMBED_BATCH_SIZE", default_value_t = 64)]
    pub embed_batch_size: usize,

    // JSON snapshot of the vector index, kept in memory only when unset
    #[arg(long, env = "INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    // Timeout for upstream API calls
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl Args {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top k must be positive".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(AppError::Config("embed batch size must be positive".to_string()));
        }
        if self.eviction_interval_secs == 0 {
            return Err(AppError::Config(
                "eviction interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig::new(self.daily_limit, self.guarded_prefix.clone())
            .with_window(Duration::from_secs(self.quota_window_secs))
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
