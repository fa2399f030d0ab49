use serde::{Deserialize, Serialize};

/// Multipart field carrying an uploaded document.
pub const UPLOAD_FILE_FIELD: &str = "file";
/// Multipart field carrying a new system prompt.
pub const SYSTEM_PROMPT_FIELD: &str = "prompt";
/// Terminal data line of the streamed query endpoint.
pub const STREAM_DONE_MARKER: &str = "[DONE]";

pub const HEALTHY_STATUS: &str = "healthy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub available_models: Vec<String>,
    #[serde(default)]
    pub current_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub documents_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY_STATUS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadModelQuery {
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub use_rag: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptResponse {
    pub system_prompt: String,
}

/// One `data:` payload of the streamed query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Text { text: String },
    Sources { sources: Vec<String> },
}

impl StreamFrame {
    /// Returns `Ok(None)` for the end-of-stream marker.
    pub fn parse(data: &str) -> Result<Option<Self>, serde_json::Error> {
        let data = data.trim();
        if data == STREAM_DONE_MARKER {
            return Ok(None);
        }
        serde_json::from_str(data).map(Some)
    }
}
