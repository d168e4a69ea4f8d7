//! Client for an OpenAI-compatible embeddings + chat completion API.

use std::time::Duration;

use crate::error::AppError;
use crate::models::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
};

const MAX_TOKENS: u32 = 500;

// Inputs sent per embeddings request
pub const DEFAULT_EMBED_BATCH: usize = 64;

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
    embed_batch: usize,
}

impl LlmClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client, base_url, api_key, embedding_model, chat_model))
    }

    pub fn from_client(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            embedding_model: embedding_model.into(),
            chat_model: chat_model.into(),
            embed_batch: DEFAULT_EMBED_BATCH,
        }
    }

    pub fn with_embed_batch(mut self, embed_batch: usize) -> Self {
        self.embed_batch = embed_batch.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Embed `texts`, vectors come back in input order.
    ///
    /// Inputs go out in batches of at most `embed_batch` per request.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch) {
            vectors.extend(self.request_embeddings(batch).await?);
        }
        Ok(vectors)
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let res = self.post("/embeddings").json(&body).send().await?;
        let res = check_status(res, "embeddings").await?;

        let mut parsed = res
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Parse Error: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::Upstream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<String, AppError> {
        let body = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
        };

        let res = self.post("/chat/completions").json(&body).send().await?;
        let res = check_status(res, "chat").await?;

        let parsed = res
            .json::<ChatResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Parse Error: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| AppError::Upstream("chat API returned no choices".to_string()))
    }
}

// Provider error bodies stay in the log, clients only see the status
async fn check_status(res: reqwest::Response, api: &str) -> Result<reqwest::Response, AppError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    tracing::warn!(api, status = %status, body = %body, "upstream API returned an error");
    Err(AppError::Upstream(format!("{} API returned {}", api, status)))
}
