//! Client core for the RAG chat front ends: backend access, the abstract UI
//! surface and the session controller that orchestrates between them.

pub mod backend;
pub mod controller;
pub mod error;
pub mod http_backend;
pub mod surface;
pub mod templates;
pub mod transcript;

pub use backend::{BackendResult, DocumentUpload, QueryStreamChunk, RagBackend};
pub use controller::{
    events::UiIntent,
    orchestration::{dispatch_intent, run_intent_loop, INTENT_QUEUE_CAPACITY},
    session::{
        ControllerSettings, QueryOptions, SessionController, SessionSnapshot, UploadSummary,
        QUERY_FAILED_MARKER,
    },
};
pub use error::{BackendError, ControllerError, FailureKind, ValidationError};
pub use http_backend::HttpRagBackend;
pub use surface::{
    Control, ControlState, ModelOption, StatsView, StatusBanner, StatusLevel, SystemStatus,
    UiSurface,
};
pub use templates::PromptTemplate;
