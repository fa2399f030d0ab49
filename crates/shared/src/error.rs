use serde::{Deserialize, Serialize};

/// Error body returned by the backend for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Best-effort extraction of the `detail` field from a raw response body.
    pub fn from_body(body: &str) -> Option<String> {
        let parsed: ErrorDetail = serde_json::from_str(body).ok()?;
        match parsed.detail {
            serde_json::Value::String(text) => Some(text),
            other => Some(other.to_string()),
        }
    }
}
