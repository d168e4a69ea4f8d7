use serde::{Deserialize, Serialize};

fn default_namespace() -> String {
    "default".to_string()
}

// Ingest API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct IngestRequest {
    pub texts: Vec<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct IngestResponse {
    pub status: String,
    pub indexed_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
}

// Query API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RetrievedChunk {
    pub text_preview: String,
    pub metadata: serde_json::Value,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QueryResponse {
    pub answer: String,
    pub retrieved: Vec<RetrievedChunk>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct IndexInfo {
    pub status: String,
    pub count: usize,
}

// OpenAI-compatible embeddings wire format
#[derive(Serialize, Debug)]
pub struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Deserialize, Debug)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

// OpenAI-compatible chat completion wire format
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    pub message: ChatMessage,
}
