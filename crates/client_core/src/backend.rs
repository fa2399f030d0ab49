//! Backend API seam: every remote operation the session controller performs.

use std::path::Path;

use async_trait::async_trait;
use shared::protocol::{HealthResponse, ModelsResponse, QueryRequest, QueryResponse};
use tokio::sync::mpsc;

use crate::error::BackendError;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub async fn from_path(path: &Path) -> BackendResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| BackendError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            filename,
            mime_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryStreamChunk {
    Text(String),
    Sources(Vec<String>),
}

#[async_trait]
pub trait RagBackend: Send + Sync {
    async fn list_models(&self) -> BackendResult<ModelsResponse>;
    async fn health(&self) -> BackendResult<HealthResponse>;
    async fn load_model(&self, model_name: &str) -> BackendResult<()>;
    async fn upload_document(&self, document: DocumentUpload) -> BackendResult<()>;
    async fn clear_documents(&self) -> BackendResult<()>;
    async fn query(&self, request: &QueryRequest) -> BackendResult<QueryResponse>;
    /// Pushes chunks into `chunks` as they arrive; returns once the stream is complete.
    async fn query_stream(
        &self,
        request: &QueryRequest,
        chunks: mpsc::UnboundedSender<QueryStreamChunk>,
    ) -> BackendResult<()>;
    async fn system_prompt(&self) -> BackendResult<String>;
    async fn set_system_prompt(&self, prompt: &str) -> BackendResult<()>;
}
