//! Abstract UI-binding layer the session controller renders into.

use std::time::Duration;

use async_trait::async_trait;
use shared::domain::{ChatMessage, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    LoadModel,
    Upload,
    ClearDocuments,
    Send,
}

impl Control {
    pub fn idle_label(self) -> &'static str {
        match self {
            Self::LoadModel => "Load Model",
            Self::Upload => "Upload",
            Self::ClearDocuments => "Clear Documents",
            Self::Send => "Send",
        }
    }

    /// Label shown while the control's request is in flight.
    pub fn busy_label(self) -> &'static str {
        match self {
            Self::LoadModel => "Loading...",
            Self::Upload => "Uploading...",
            Self::ClearDocuments => "Clear Documents",
            Self::Send => "Processing...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub enabled: bool,
    pub label: &'static str,
}

impl ControlState {
    pub fn idle(control: Control) -> Self {
        Self {
            enabled: true,
            label: control.idle_label(),
        }
    }

    pub fn busy(control: Control) -> Self {
        Self {
            enabled: false,
            label: control.busy_label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBanner {
    pub level: StatusLevel,
    pub text: String,
    pub dismiss_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    Online,
    Offline,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsView {
    pub current_model_label: String,
    /// `None` when the health fetch failed and the previous count should stay.
    pub documents_count: Option<u64>,
    pub model_loaded: Option<bool>,
    pub system_status: SystemStatus,
}

#[async_trait]
pub trait UiSurface: Send + Sync {
    fn set_model_options(&self, options: &[ModelOption]);
    fn set_control_state(&self, control: Control, state: ControlState);
    /// The surface removes the banner once `dismiss_after` has elapsed.
    fn show_status(&self, banner: StatusBanner);
    fn render_stats(&self, stats: &StatsView);
    fn append_message(&self, id: MessageId, message: &ChatMessage);
    fn update_message(&self, id: MessageId, message: &ChatMessage);
    fn clear_file_selection(&self);
    fn show_prompt_editor(&self, text: &str);
    fn set_prompt_buffer(&self, text: &str);
    fn hide_prompt_editor(&self);
    /// Blocking notice the user has to acknowledge.
    fn warn(&self, message: &str);
    async fn confirm(&self, question: &str) -> bool;
}
