//! Session controller: owns the client session state and maps user intents
//! onto backend calls.
//!
//! All state lives behind one async mutex that is never held across a
//! backend await. The query in-flight flag is kept outside the mutex so it can
//! be released from a drop guard on every exit path of [`SessionController::send_query`],
//! including cancellation of the handler future. Controls that trigger a
//! request are latched busy for as long as the request runs, and an intent
//! arriving for a busy control is dropped.

use std::{
    collections::HashSet,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard,
    },
    time::Duration,
};

use shared::{
    domain::{model_display_label, ChatMessage, MessageId},
    protocol::QueryRequest,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendResult, DocumentUpload, QueryStreamChunk, RagBackend},
    controller::events::UiIntent,
    error::{ControllerError, FailureKind, ValidationError},
    surface::{
        Control, ControlState, ModelOption, StatsView, StatusBanner, StatusLevel, SystemStatus,
        UiSurface,
    },
    templates::PromptTemplate,
    transcript::ChatTranscript,
};

/// Text shown in place of an answer when the query fails.
pub const QUERY_FAILED_MARKER: &str = "Error: Failed to get response";
pub const CLEAR_DOCUMENTS_QUESTION: &str = "Are you sure you want to clear all documents?";
pub const EMPTY_PROMPT_WARNING: &str = "System prompt must not be empty";
pub const SAVE_PROMPT_FAILED_WARNING: &str = "Failed to save system prompt";

const DEFAULT_STATUS_DISMISS: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub use_rag: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_rag: true,
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

impl QueryOptions {
    pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 64..=4096;
    pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

    pub fn new(use_rag: bool, max_tokens: u32, temperature: f32) -> Self {
        Self::default()
            .with_use_rag(use_rag)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature)
    }

    pub fn with_use_rag(mut self, use_rag: bool) -> Self {
        self.use_rag = use_rag;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.clamp(
            *Self::MAX_TOKENS_RANGE.start(),
            *Self::MAX_TOKENS_RANGE.end(),
        );
        self
    }

    /// NaN leaves the current temperature in place.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        if !temperature.is_nan() {
            self.temperature = temperature.clamp(
                *Self::TEMPERATURE_RANGE.start(),
                *Self::TEMPERATURE_RANGE.end(),
            );
        }
        self
    }

    fn request(&self, query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            use_rag: self.use_rag,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub query_options: QueryOptions,
    pub stream_responses: bool,
    pub status_dismiss_after: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            query_options: QueryOptions::default(),
            stream_responses: false,
            status_dismiss_after: DEFAULT_STATUS_DISMISS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub available_models: Vec<String>,
    pub selected_model: Option<String>,
    pub current_model: Option<String>,
    pub query_options: QueryOptions,
    pub query_in_flight: bool,
    pub messages: Vec<ChatMessage>,
    pub selected_files: Vec<PathBuf>,
    pub prompt_buffer: String,
    pub prompt_editor_open: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    available_models: Vec<String>,
    selected_model: Option<String>,
    current_model: Option<String>,
    query_options: QueryOptions,
    transcript: ChatTranscript,
    selected_files: Vec<PathBuf>,
    prompt_buffer: String,
    prompt_editor_open: bool,
}

impl SessionState {
    fn model_options(&self) -> Vec<ModelOption> {
        self.available_models
            .iter()
            .map(|id| ModelOption {
                id: id.clone(),
                label: model_display_label(id).to_string(),
                selected: self.selected_model.as_deref() == Some(id.as_str()),
            })
            .collect()
    }
}

type BusyControls = StdMutex<HashSet<Control>>;

fn lock_busy(busy: &BusyControls) -> StdMutexGuard<'_, HashSet<Control>> {
    busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps a control disabled with its busy label until dropped.
struct BusyControl<'a> {
    ui: &'a dyn UiSurface,
    busy: &'a BusyControls,
    control: Control,
}

impl<'a> BusyControl<'a> {
    /// `None` while the control is already latched by another request.
    fn try_engage(
        ui: &'a dyn UiSurface,
        busy: &'a BusyControls,
        control: Control,
    ) -> Option<Self> {
        if !lock_busy(busy).insert(control) {
            return None;
        }
        ui.set_control_state(control, ControlState::busy(control));
        Some(Self { ui, busy, control })
    }
}

impl Drop for BusyControl<'_> {
    fn drop(&mut self) {
        lock_busy(self.busy).remove(&self.control);
        self.ui
            .set_control_state(self.control, ControlState::idle(self.control));
    }
}

/// Holds the query in-flight flag and the busy Send control.
struct QueryFlight<'a> {
    flag: &'a AtomicBool,
    _send: BusyControl<'a>,
}

impl<'a> QueryFlight<'a> {
    fn try_acquire(
        flag: &'a AtomicBool,
        ui: &'a dyn UiSurface,
        busy: &'a BusyControls,
    ) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let Some(send) = BusyControl::try_engage(ui, busy, Control::Send) else {
            flag.store(false, Ordering::Release);
            return None;
        };
        Some(Self { flag, _send: send })
    }
}

impl Drop for QueryFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SessionController {
    backend: Arc<dyn RagBackend>,
    ui: Arc<dyn UiSurface>,
    stream_responses: bool,
    status_dismiss_after: Duration,
    query_in_flight: AtomicBool,
    busy_controls: BusyControls,
    inner: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn RagBackend>,
        ui: Arc<dyn UiSurface>,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            ui,
            stream_responses: settings.stream_responses,
            status_dismiss_after: settings.status_dismiss_after,
            query_in_flight: AtomicBool::new(false),
            busy_controls: StdMutex::new(HashSet::new()),
            inner: Mutex::new(SessionState {
                query_options: settings.query_options,
                ..SessionState::default()
            }),
        })
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            available_models: state.available_models.clone(),
            selected_model: state.selected_model.clone(),
            current_model: state.current_model.clone(),
            query_options: state.query_options,
            query_in_flight: self.query_in_flight.load(Ordering::Acquire),
            messages: state.transcript.messages().cloned().collect(),
            selected_files: state.selected_files.clone(),
            prompt_buffer: state.prompt_buffer.clone(),
            prompt_editor_open: state.prompt_editor_open,
        }
    }

    /// Single entry point for queued intents. Failures were already surfaced
    /// through the UI by the handler, so they only get logged here.
    pub async fn handle_intent(&self, intent: UiIntent) {
        let intent_name = intent.name();
        let result = match intent {
            UiIntent::RefreshModels => self.load_models().await.map(drop),
            UiIntent::SelectModel { model_id } => self.select_model(&model_id).await,
            UiIntent::LoadSelectedModel => self.load_selected_model().await,
            UiIntent::RefreshStats => {
                self.refresh_stats().await;
                Ok(())
            }
            UiIntent::SelectFiles { paths } => {
                self.select_files(paths).await;
                Ok(())
            }
            UiIntent::UploadDocuments => self.upload_documents().await.map(drop),
            UiIntent::ClearDocuments => self.clear_documents().await,
            UiIntent::SendQuery { text } => self.send_query(&text).await.map(drop),
            UiIntent::SetUseRag(use_rag) => {
                self.set_use_rag(use_rag).await;
                Ok(())
            }
            UiIntent::SetMaxTokens(max_tokens) => {
                self.set_max_tokens(max_tokens).await;
                Ok(())
            }
            UiIntent::SetTemperature(temperature) => {
                self.set_temperature(temperature).await;
                Ok(())
            }
            UiIntent::OpenPromptEditor => {
                self.open_prompt_editor().await;
                Ok(())
            }
            UiIntent::EditPrompt { text } => {
                self.edit_prompt(text).await;
                Ok(())
            }
            UiIntent::SelectTemplate { template_id } => {
                self.select_template(&template_id).await;
                Ok(())
            }
            UiIntent::SavePrompt => self.save_system_prompt().await,
            UiIntent::ClosePromptEditor => {
                self.close_prompt_editor().await;
                Ok(())
            }
        };

        if let Err(err) = result {
            match err.kind() {
                FailureKind::Ignored => debug!(intent = intent_name, reason = %err, "intent ignored"),
                FailureKind::Validation => {
                    debug!(intent = intent_name, reason = %err, "intent rejected")
                }
                FailureKind::NetworkOrServer => {
                    warn!(intent = intent_name, error = %err, "intent failed")
                }
            }
        }
    }

    /// Fetches models and stats. A failed fetch is shown but never aborts startup.
    pub async fn initialize(&self) {
        if self.load_models().await.is_err() {
            self.refresh_stats().await;
        }
    }

    pub async fn load_models(&self) -> Result<Vec<ModelOption>, ControllerError> {
        let response = match self.backend.list_models().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "failed to list models");
                self.show_status(StatusLevel::Error, "Failed to load models");
                return Err(err.into());
            }
        };

        let options = {
            let mut state = self.inner.lock().await;
            let selected = response
                .current_model
                .as_ref()
                .filter(|current| response.available_models.contains(*current))
                .or_else(|| response.available_models.first())
                .cloned();
            state.current_model = response.current_model;
            state.available_models = response.available_models;
            state.selected_model = selected;
            state.model_options()
        };
        self.ui.set_model_options(&options);
        self.refresh_stats().await;
        Ok(options)
    }

    pub async fn select_model(&self, model_id: &str) -> Result<(), ControllerError> {
        let options = {
            let mut state = self.inner.lock().await;
            if !state.available_models.iter().any(|id| id == model_id) {
                drop(state);
                self.show_status(StatusLevel::Error, format!("Unknown model {model_id}"));
                return Err(ValidationError::UnknownModel.into());
            }
            state.selected_model = Some(model_id.to_string());
            state.model_options()
        };
        self.ui.set_model_options(&options);
        Ok(())
    }

    /// Re-entrant clicks are prevented only by the disabled control.
    pub async fn load_selected_model(&self) -> Result<(), ControllerError> {
        let Some(model) = self.inner.lock().await.selected_model.clone() else {
            return Err(ControllerError::NoModelSelected);
        };

        let _busy = self.engage(Control::LoadModel)?;
        match self.backend.load_model(&model).await {
            Ok(()) => {
                self.inner.lock().await.current_model = Some(model.clone());
                info!(model = %model, "model loaded");
                self.show_status(
                    StatusLevel::Success,
                    format!("Model {} loaded!", model_display_label(&model)),
                );
                self.refresh_stats().await;
                Ok(())
            }
            Err(err) => {
                warn!(model = %model, error = %err, "model load failed");
                self.show_status(StatusLevel::Error, "Failed to load model");
                Err(err.into())
            }
        }
    }

    pub async fn refresh_stats(&self) -> StatsView {
        let health = self.backend.health().await;
        let current_model_label = self
            .inner
            .lock()
            .await
            .current_model
            .as_deref()
            .map(model_display_label)
            .unwrap_or("-")
            .to_string();

        let stats = match health {
            Ok(health) => StatsView {
                current_model_label,
                documents_count: Some(health.documents_count),
                model_loaded: health.model_loaded,
                system_status: if health.is_healthy() {
                    SystemStatus::Online
                } else {
                    SystemStatus::Offline
                },
            },
            Err(err) => {
                warn!(error = %err, "health check failed");
                StatsView {
                    current_model_label,
                    documents_count: None,
                    model_loaded: None,
                    system_status: SystemStatus::Error,
                }
            }
        };
        self.ui.render_stats(&stats);
        stats
    }

    pub async fn select_files(&self, paths: Vec<PathBuf>) {
        self.inner.lock().await.selected_files = paths;
    }

    /// Uploads the selected files one request at a time, in selection order.
    /// A failed file never stops the rest of the batch.
    pub async fn upload_documents(&self) -> Result<UploadSummary, ControllerError> {
        let files = self.inner.lock().await.selected_files.clone();
        if files.is_empty() {
            self.show_status(StatusLevel::Error, "Please select files");
            return Err(ValidationError::EmptyFileSelection.into());
        }

        let summary = {
            let _busy = self.engage(Control::Upload)?;
            let mut summary = UploadSummary::default();
            for path in &files {
                match self.upload_file(path).await {
                    Ok(()) => summary.succeeded += 1,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "document upload failed");
                        summary.failed += 1;
                    }
                }
            }
            summary
        };

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "upload batch finished"
        );
        if summary.failed == 0 {
            self.show_status(
                StatusLevel::Success,
                format!("Uploaded {} file(s)", summary.succeeded),
            );
        } else {
            self.show_status(
                StatusLevel::Error,
                format!(
                    "Uploaded {}, failed {}",
                    summary.succeeded, summary.failed
                ),
            );
        }

        self.inner.lock().await.selected_files.clear();
        self.ui.clear_file_selection();
        self.refresh_stats().await;
        Ok(summary)
    }

    async fn upload_file(&self, path: &Path) -> BackendResult<()> {
        let document = DocumentUpload::from_path(path).await?;
        self.backend.upload_document(document).await
    }

    pub async fn clear_documents(&self) -> Result<(), ControllerError> {
        if self.is_busy(Control::ClearDocuments) {
            return Err(ControllerError::ControlBusy(Control::ClearDocuments));
        }
        if !self.ui.confirm(CLEAR_DOCUMENTS_QUESTION).await {
            return Err(ControllerError::Declined);
        }

        let _busy = self.engage(Control::ClearDocuments)?;
        match self.backend.clear_documents().await {
            Ok(()) => {
                info!("documents cleared");
                self.show_status(StatusLevel::Success, "All documents cleared");
                self.refresh_stats().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "clearing documents failed");
                self.show_status(StatusLevel::Error, "Failed to clear documents");
                Err(err.into())
            }
        }
    }

    /// Submits a query unless one is already pending. Returns the id of the
    /// assistant entry that holds the answer (or the failure marker).
    pub async fn send_query(&self, input: &str) -> Result<MessageId, ControllerError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let Some(_flight) =
            QueryFlight::try_acquire(&self.query_in_flight, self.ui.as_ref(), &self.busy_controls)
        else {
            debug!("query submission rejected while another is pending");
            return Err(ControllerError::QueryPending);
        };

        let (placeholder_id, request) = {
            let mut state = self.inner.lock().await;
            let user_message = ChatMessage::user(query);
            let user_id = state.transcript.push(user_message.clone());
            self.ui.append_message(user_id, &user_message);

            let placeholder = ChatMessage::assistant_placeholder();
            let placeholder_id = state.transcript.push(placeholder.clone());
            self.ui.append_message(placeholder_id, &placeholder);

            (placeholder_id, state.query_options.request(query))
        };

        let result = if self.stream_responses {
            self.run_streamed_query(placeholder_id, &request).await
        } else {
            self.run_query(placeholder_id, &request).await
        };

        match result {
            Ok(()) => Ok(placeholder_id),
            Err(err) => {
                warn!(error = %err, "query failed");
                self.update_transcript(placeholder_id, |transcript| {
                    transcript.fail(placeholder_id, QUERY_FAILED_MARKER)
                })
                .await;
                Err(err.into())
            }
        }
    }

    async fn run_query(&self, placeholder_id: MessageId, request: &QueryRequest) -> BackendResult<()> {
        let response = self.backend.query(request).await?;
        let sources = response.sources.unwrap_or_default();
        self.update_transcript(placeholder_id, |transcript| {
            transcript.complete(placeholder_id, response.answer, sources, response.model_used)
        })
        .await;
        Ok(())
    }

    async fn run_streamed_query(
        &self,
        placeholder_id: MessageId,
        request: &QueryRequest,
    ) -> BackendResult<()> {
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let stream = self.backend.query_stream(request, chunk_tx);
        let apply_chunks = async {
            while let Some(chunk) = chunk_rx.recv().await {
                match chunk {
                    QueryStreamChunk::Text(text) => {
                        self.update_transcript(placeholder_id, |transcript| {
                            transcript.append_text(placeholder_id, &text)
                        })
                        .await
                    }
                    QueryStreamChunk::Sources(sources) => {
                        self.update_transcript(placeholder_id, |transcript| {
                            transcript.set_sources(placeholder_id, sources)
                        })
                        .await
                    }
                }
            }
        };

        let (result, ()) = tokio::join!(stream, apply_chunks);
        result?;
        self.update_transcript(placeholder_id, |transcript| transcript.finish(placeholder_id))
            .await;
        Ok(())
    }

    async fn update_transcript<F>(&self, id: MessageId, apply: F)
    where
        F: FnOnce(&mut ChatTranscript) -> Option<&ChatMessage>,
    {
        let mut state = self.inner.lock().await;
        if let Some(message) = apply(&mut state.transcript) {
            self.ui.update_message(id, message);
        }
    }

    pub async fn set_use_rag(&self, use_rag: bool) -> QueryOptions {
        let mut state = self.inner.lock().await;
        state.query_options = state.query_options.with_use_rag(use_rag);
        state.query_options
    }

    pub async fn set_max_tokens(&self, max_tokens: u32) -> QueryOptions {
        let mut state = self.inner.lock().await;
        state.query_options = state.query_options.with_max_tokens(max_tokens);
        state.query_options
    }

    pub async fn set_temperature(&self, temperature: f32) -> QueryOptions {
        let mut state = self.inner.lock().await;
        state.query_options = state.query_options.with_temperature(temperature);
        state.query_options
    }

    /// Always opens the editor; a failed fetch leaves it empty.
    pub async fn open_prompt_editor(&self) -> String {
        let text = match self.backend.system_prompt().await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to fetch system prompt");
                String::new()
            }
        };

        {
            let mut state = self.inner.lock().await;
            state.prompt_buffer = text.clone();
            state.prompt_editor_open = true;
        }
        self.ui.show_prompt_editor(&text);
        text
    }

    pub async fn edit_prompt(&self, text: String) {
        self.inner.lock().await.prompt_buffer = text;
    }

    pub async fn select_template(&self, template_id: &str) -> PromptTemplate {
        let template = PromptTemplate::from_id(template_id);
        self.inner.lock().await.prompt_buffer = template.text().to_string();
        self.ui.set_prompt_buffer(template.text());
        template
    }

    pub async fn save_system_prompt(&self) -> Result<(), ControllerError> {
        let prompt = self.inner.lock().await.prompt_buffer.trim().to_string();
        if prompt.is_empty() {
            self.ui.warn(EMPTY_PROMPT_WARNING);
            return Err(ValidationError::EmptyPrompt.into());
        }

        match self.backend.set_system_prompt(&prompt).await {
            Ok(()) => {
                info!(length = prompt.len(), "system prompt updated");
                self.show_status(StatusLevel::Success, "System prompt updated");
                self.close_prompt_editor().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "saving system prompt failed");
                self.ui.warn(SAVE_PROMPT_FAILED_WARNING);
                Err(err.into())
            }
        }
    }

    pub async fn close_prompt_editor(&self) {
        self.inner.lock().await.prompt_editor_open = false;
        self.ui.hide_prompt_editor();
    }

    /// Controls currently latched busy by a running request.
    pub fn is_busy(&self, control: Control) -> bool {
        lock_busy(&self.busy_controls).contains(&control)
    }

    fn engage(&self, control: Control) -> Result<BusyControl<'_>, ControllerError> {
        BusyControl::try_engage(self.ui.as_ref(), &self.busy_controls, control).ok_or_else(|| {
            debug!(?control, "intent dropped while its control is busy");
            ControllerError::ControlBusy(control)
        })
    }

    fn show_status(&self, level: StatusLevel, text: impl Into<String>) {
        self.ui.show_status(StatusBanner {
            level,
            text: text.into(),
            dismiss_after: self.status_dismiss_after,
        });
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
