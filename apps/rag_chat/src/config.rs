use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::{ControllerSettings, QueryOptions};
use serde::Deserialize;
use url::Url;

const LOCAL_CONFIG_FILE: &str = "rag_chat.toml";
const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub use_rag: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub status_dismiss_ms: u64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let options = QueryOptions::default();
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            use_rag: options.use_rag,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
            status_dismiss_ms: 3000,
            log_level: "info".into(),
        }
    }
}

/// Every key is optional so a file may override any subset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    backend_url: Option<String>,
    use_rag: Option<bool>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    stream: Option<bool>,
    status_dismiss_ms: Option<u64>,
    log_level: Option<String>,
}

/// Values given on the command line; `None` keeps the loaded setting.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub use_rag: Option<bool>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.backend_url {
            self.backend_url = v;
        }
        if let Some(v) = overrides.use_rag {
            self.use_rag = v;
        }
        if let Some(v) = overrides.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = overrides.temperature {
            self.temperature = v;
        }
        if let Some(v) = overrides.stream {
            self.stream = v;
        }
        if let Some(v) = overrides.log_level {
            self.log_level = v;
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            query_options: QueryOptions::new(self.use_rag, self.max_tokens, self.temperature),
            stream_responses: self.stream,
            status_dismiss_after: Duration::from_millis(self.status_dismiss_ms),
        }
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.backend_url {
            self.backend_url = v;
        }
        if let Some(v) = file.use_rag {
            self.use_rag = v;
        }
        if let Some(v) = file.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = file.temperature {
            self.temperature = v;
        }
        if let Some(v) = file.stream {
            self.stream = v;
        }
        if let Some(v) = file.status_dismiss_ms {
            self.status_dismiss_ms = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
    }

    /// Unparsable values are skipped and the previous layer wins.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("RAG_CHAT_BACKEND_URL") {
            self.backend_url = v;
        }
        if let Some(v) = env("APP__BACKEND_URL") {
            self.backend_url = v;
        }

        if let Some(v) = env("APP__USE_RAG").and_then(|v| parse_bool(&v)) {
            self.use_rag = v;
        }
        if let Some(v) = env("APP__MAX_TOKENS").and_then(|v| v.trim().parse().ok()) {
            self.max_tokens = v;
        }
        if let Some(v) = env("APP__TEMPERATURE").and_then(|v| v.trim().parse().ok()) {
            self.temperature = v;
        }
        if let Some(v) = env("APP__STREAM").and_then(|v| parse_bool(&v)) {
            self.stream = v;
        }
        if let Some(v) = env("APP__STATUS_DISMISS_MS").and_then(|v| v.trim().parse().ok()) {
            self.status_dismiss_ms = v;
        }
        if let Some(v) = env("APP__LOG_LEVEL") {
            self.log_level = v;
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Defaults, then the config file, then the process environment.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config_file(),
    };
    load_settings_from(path.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    config_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(path) = config_path {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        settings.apply_file(file_cfg);
    }

    settings.apply_env(env);
    Ok(settings)
}

fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("rag_chat").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Accepts a bare `host:port` and strips the trailing slash so endpoint paths
/// can be appended directly.
pub fn normalize_backend_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_BACKEND_URL.to_string());
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&candidate)
        .with_context(|| format!("invalid backend url '{raw}'"))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!("backend url '{raw}' must use http or https");
    }
    if url.host_str().is_none() {
        bail!("backend url '{raw}' has no host");
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("backend url '{raw}' must not carry a query or fragment");
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
