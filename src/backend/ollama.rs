//! Local Ollama backend (`/api/generate`). No key needed; endpoint and
//! model come from `OLLAMA_HOST` / `OLLAMA_MODEL` or the config override.

use super::{transport_error, LlmBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BACKEND_NAME: &str = "ollama";
const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1";

pub struct OllamaBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaBackend {
    pub fn from_env(http: reqwest::Client, model: Option<String>) -> Self {
        let endpoint =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model = model
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            http,
            endpoint,
            model,
        }
    }

    /// For tests against a stub server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Probe `/api/tags`; a dead server fails every call anyway, but the
    /// probe gives the operator an immediate answer at startup.
    pub async fn is_available(&self) -> bool {
        self.http
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}
#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn infer(&self, prompt: &str) -> Result<String> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: 4096,
                temperature: 0.1,
            },
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(BACKEND_NAME, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(backend = BACKEND_NAME, %status, body = %body, "API error status");
            return Err(Error::BackendUnavailable {
                backend: BACKEND_NAME,
                cause: format!("API returned status {status}"),
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| transport_error(BACKEND_NAME, &e))?;
        let text = body.response.trim().to_string();
        if text.is_empty() {
            return Err(Error::BackendUnavailable {
                backend: BACKEND_NAME,
                cause: "empty completion".to_string(),
            });
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }
}
