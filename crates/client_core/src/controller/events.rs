//! User intents raised by a UI front end.

use std::path::PathBuf;

use crate::surface::Control;

#[derive(Debug, Clone, PartialEq)]
pub enum UiIntent {
    RefreshModels,
    SelectModel { model_id: String },
    LoadSelectedModel,
    RefreshStats,
    SelectFiles { paths: Vec<PathBuf> },
    UploadDocuments,
    ClearDocuments,
    SendQuery { text: String },
    SetUseRag(bool),
    SetMaxTokens(u32),
    SetTemperature(f32),
    OpenPromptEditor,
    EditPrompt { text: String },
    SelectTemplate { template_id: String },
    SavePrompt,
    ClosePromptEditor,
}

impl UiIntent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshModels => "refresh_models",
            Self::SelectModel { .. } => "select_model",
            Self::LoadSelectedModel => "load_selected_model",
            Self::RefreshStats => "refresh_stats",
            Self::SelectFiles { .. } => "select_files",
            Self::UploadDocuments => "upload_documents",
            Self::ClearDocuments => "clear_documents",
            Self::SendQuery { .. } => "send_query",
            Self::SetUseRag(_) => "set_use_rag",
            Self::SetMaxTokens(_) => "set_max_tokens",
            Self::SetTemperature(_) => "set_temperature",
            Self::OpenPromptEditor => "open_prompt_editor",
            Self::EditPrompt { .. } => "edit_prompt",
            Self::SelectTemplate { .. } => "select_template",
            Self::SavePrompt => "save_prompt",
            Self::ClosePromptEditor => "close_prompt_editor",
        }
    }

    /// The control whose click raises this intent, if it has one.
    pub fn control(&self) -> Option<Control> {
        match self {
            Self::LoadSelectedModel => Some(Control::LoadModel),
            Self::UploadDocuments => Some(Control::Upload),
            Self::ClearDocuments => Some(Control::ClearDocuments),
            Self::SendQuery { .. } => Some(Control::Send),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_intents_map_to_their_controls() {
        assert_eq!(UiIntent::UploadDocuments.control(), Some(Control::Upload));
        assert_eq!(
            UiIntent::SendQuery {
                text: "hi".to_string()
            }
            .control(),
            Some(Control::Send)
        );
        assert_eq!(UiIntent::RefreshStats.control(), None);
        assert_eq!(UiIntent::SavePrompt.control(), None);
    }
}
