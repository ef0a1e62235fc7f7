//! Anthropic Claude backend (Messages API).

use super::{transport_error, LlmBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BACKEND_NAME: &str = "claude";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeBackend {
    /// Requires `ANTHROPIC_API_KEY`. Rejects obviously malformed keys early
    /// instead of burning a network round-trip on a 401.
    pub fn from_env(http: reqwest::Client, model: Option<String>) -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        if !api_key.starts_with("sk-ant-") {
            anyhow::bail!("invalid ANTHROPIC_API_KEY format: expected 'sk-ant-' prefix");
        }
        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}
#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    content: Vec<ContentBlock>,
}
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn infer(&self, prompt: &str) -> Result<String> {
        let req = Request {
            model: &self.model,
            max_tokens: 8192,
            temperature: 0.1,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

        let body: Response = resp
            .json()
            .await
            .map_err(|e| transport_error(BACKEND_NAME, &e))?;
        let text = body
            .content
            .first()
            .map(|b| b.text.trim().to_string())
            .unwrap_or_default();
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
