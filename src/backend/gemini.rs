//! Google Gemini backend (`generateContent` REST API).

use super::{transport_error, LlmBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BACKEND_NAME: &str = "gemini";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    /// Requires `GEMINI_API_KEY`.
    pub fn from_env(http: reqwest::Client, model: Option<String>) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct Request<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
// Low temperature for consistent structured output.
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}
#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}
#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn infer(&self, prompt: &str) -> Result<String> {
        let req = Request {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
            },
        };

        let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);
        let resp = self
            .http
            .post(&url)
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
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
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
