//! reqwest implementation of [`RagBackend`].

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    error::ErrorDetail,
    protocol::{
        HealthResponse, LoadModelQuery, ModelsResponse, QueryRequest, QueryResponse,
        StreamFrame, SystemPromptResponse, SYSTEM_PROMPT_FIELD, UPLOAD_FILE_FIELD,
    },
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    backend::{BackendResult, DocumentUpload, QueryStreamChunk, RagBackend},
    error::BackendError,
};

pub struct HttpRagBackend {
    http: Client,
    base_url: String,
}

impl HttpRagBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Any non-2xx status is a failure; the `detail` body is kept for logs only.
async fn ensure_success(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        detail: ErrorDetail::from_body(&body),
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl RagBackend for HttpRagBackend {
    async fn list_models(&self) -> BackendResult<ModelsResponse> {
        let response = self.http.get(self.endpoint("/models")).send().await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn health(&self) -> BackendResult<HealthResponse> {
        let response = self.http.get(self.endpoint("/health")).send().await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn load_model(&self, model_name: &str) -> BackendResult<()> {
        debug!(model = model_name, "requesting model load");
        let response = self
            .http
            .post(self.endpoint("/models/load"))
            .query(&LoadModelQuery {
                model_name: model_name.to_string(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn upload_document(&self, document: DocumentUpload) -> BackendResult<()> {
        debug!(
            filename = %document.filename,
            size_bytes = document.bytes.len(),
            "uploading document"
        );
        let part = Part::bytes(document.bytes)
            .file_name(document.filename)
            .mime_str(&document.mime_type)?;
        let response = self
            .http
            .post(self.endpoint("/upload"))
            .multipart(Form::new().part(UPLOAD_FILE_FIELD, part))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn clear_documents(&self) -> BackendResult<()> {
        let response = self.http.delete(self.endpoint("/documents")).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> BackendResult<QueryResponse> {
        let response = self
            .http
            .post(self.endpoint("/query"))
            .json(request)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn query_stream(
        &self,
        request: &QueryRequest,
        chunks: mpsc::UnboundedSender<QueryStreamChunk>,
    ) -> BackendResult<()> {
        let response = self
            .http
            .post(self.endpoint("/query/stream"))
            .json(request)
            .send()
            .await?;
        let mut events = ensure_success(response).await?.bytes_stream().eventsource();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| BackendError::Stream(e.to_string()))?;
            let frame = StreamFrame::parse(&event.data)
                .map_err(|e| BackendError::Decode(format!("{e}, data: {}", event.data)))?;
            let Some(frame) = frame else {
                return Ok(());
            };
            let chunk = match frame {
                StreamFrame::Text { text } => QueryStreamChunk::Text(text),
                StreamFrame::Sources { sources } => QueryStreamChunk::Sources(sources),
            };
            if chunks.send(chunk).is_err() {
                debug!("query stream consumer went away; dropping remaining frames");
                return Ok(());
            }
        }

        Err(BackendError::Stream(
            "stream closed before completion marker".to_string(),
        ))
    }

    async fn system_prompt(&self) -> BackendResult<String> {
        let response = self.http.get(self.endpoint("/system-prompt")).send().await?;
        let body: SystemPromptResponse = decode_json(ensure_success(response).await?).await?;
        Ok(body.system_prompt)
    }

    async fn set_system_prompt(&self, prompt: &str) -> BackendResult<()> {
        let response = self
            .http
            .post(self.endpoint("/system-prompt"))
            .multipart(Form::new().text(SYSTEM_PROMPT_FIELD, prompt.to_string()))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_backend_tests.rs"]
mod tests;
