//! LLM backend abstraction: one logical operation, `infer(prompt) -> text`,
//! polymorphic over provider. Hosted APIs (Gemini, Claude) and a local
//! Ollama server all satisfy the same trait; the pipeline never knows which.

mod claude;
mod gemini;
mod ollama;

pub use claude::ClaudeBackend;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait object used by the classifier and extractor (and test stubs).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One inference round-trip. Timeouts and transport failures surface
    /// as `Error::BackendUnavailable`.
    async fn infer(&self, prompt: &str) -> Result<String>;

    /// Backend name for diagnostics and the batch summary.
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynBackend = Arc<dyn LlmBackend>;

/// Factory: build a backend from the run configuration. Dispatches on the
/// already-validated `backend` string.
pub fn build_backend(config: &PipelineConfig) -> anyhow::Result<DynBackend> {
    let http = build_http_client(config.timeout(), config.connect_timeout())?;
    let model = config.model.clone();
    let backend: DynBackend = match config.backend.as_str() {
        "gemini" => Arc::new(GeminiBackend::from_env(http, model)?),
        "claude" => Arc::new(ClaudeBackend::from_env(http, model)?),
        "ollama" => Arc::new(OllamaBackend::from_env(http, model)),
        other => anyhow::bail!("unsupported backend: {other}"),
    };
    tracing::info!(backend = backend.name(), "LLM backend ready");
    Ok(backend)
}

/// Shared reqwest client with the caller-configured timeouts. Reused across
/// items as a stateless transport resource.
pub fn build_http_client(timeout: Duration, connect_timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("ttp-intel-pipeline/0.1 (+github.com/lumlich/ttp-intel-pipeline)")
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("building http client: {e}"))
}

/// Map a reqwest failure onto the per-item taxonomy.
pub(crate) fn transport_error(backend: &'static str, e: &reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else {
        "transport"
    };
    tracing::warn!(backend, error = %e, kind, "LLM request failed");
    Error::BackendUnavailable {
        backend,
        cause: format!("{kind} error: {e}"),
    }
}

/// Extract the JSON object from an LLM response, tolerating markdown fences
/// and surrounding prose. Returns the input unchanged when no object is
/// recognizable; the caller's serde parse decides what that means.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` blocks without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw JSON: first { to last }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}
