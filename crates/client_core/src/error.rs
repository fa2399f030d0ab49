use std::path::PathBuf;

use thiserror::Error;

use crate::surface::Control;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with status {status}{}", format_detail(.detail))]
    Status { status: u16, detail: Option<String> },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
    #[error("query stream interrupted: {0}")]
    Stream(String),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn format_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyQuery,
    EmptyPrompt,
    EmptyFileSelection,
    UnknownModel,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::EmptyQuery => "query must not be empty",
            Self::EmptyPrompt => "system prompt must not be empty",
            Self::EmptyFileSelection => "no files selected",
            Self::UnknownModel => "model is not in the available list",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any request was issued.
    Validation,
    /// Non-2xx response or transport error.
    NetworkOrServer,
    /// Intent dropped without user-facing feedback.
    Ignored,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("validation failed: {0}")]
    Validation(ValidationError),
    #[error("a query is already pending")]
    QueryPending,
    #[error("no model selected")]
    NoModelSelected,
    #[error("action declined by user")]
    Declined,
    #[error("{} is already in progress", .0.idle_label())]
    ControlBusy(Control),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ControllerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Backend(_) => FailureKind::NetworkOrServer,
            Self::QueryPending
            | Self::NoModelSelected
            | Self::Declined
            | Self::ControlBusy(_) => FailureKind::Ignored,
        }
    }
}

impl From<ValidationError> for ControllerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
