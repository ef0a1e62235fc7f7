// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "TTP_PIPELINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

fn default_timeout_seconds() -> u64 {
    120
}
fn default_connect_timeout_seconds() -> u64 {
    5
}

/// Startup configuration for one pipeline run. Built once, passed in
/// explicitly; there is no process-wide mutable state. API keys are read
/// from the environment by the backends, never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// "gemini" | "claude" | "ollama" (case-insensitive).
    pub backend: String,
    /// Optional model override; each backend has its own default.
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call timeout. Timeouts count as backend-unavailable failures.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    /// Throttle: process at most this many items per batch.
    #[serde(default)]
    pub max_items_per_batch: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".to_string(),
            model: None,
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            max_items_per_batch: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let mut cfg: PipelineConfig = toml::from_str(&data)
            .with_context(|| format!("parsing pipeline config from {}", path.display()))?;
        cfg.backend = cfg.backend.to_lowercase();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallback:
    /// 1) $TTP_PIPELINE_CONFIG
    /// 2) config/pipeline.toml
    /// 3) defaults
    /// Env overrides (`TTP_BACKEND`, `TTP_MODEL`, `TTP_TIMEOUT_SECONDS`)
    /// apply on top in all three cases.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("TTP_PIPELINE_CONFIG points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TTP_BACKEND") {
            if !v.trim().is_empty() {
                self.backend = v.trim().to_lowercase();
            }
        }
        if let Ok(v) = std::env::var("TTP_MODEL") {
            if !v.trim().is_empty() {
                self.model = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var("TTP_TIMEOUT_SECONDS") {
            if let Ok(secs) = v.trim().parse::<u64>() {
                self.timeout_seconds = secs;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self.backend.as_str() {
            "gemini" | "claude" | "ollama" => {}
            other => return Err(anyhow!("unsupported backend in config: {other}")),
        }
        if self.timeout_seconds == 0 {
            return Err(anyhow!("timeout_seconds must be non-zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
