//! Text generation client for a KoboldCpp-compatible sidecar.
//!
//! The chat layer talks to generation through the [`TextGenerator`] trait so
//! tests can substitute a canned generator; [`LlmClient`] is the real
//! implementation speaking the KoboldCpp HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::errors::{MemoryError, Result};

/// Sampling is cut off at these markers so the model cannot speak for the
/// user or fabricate new system turns.
const STOP_SEQUENCES: &[&str] = &["User:", "\nUser:", "System:"];

/// Anything that can turn a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for `prompt`. The returned text is trimmed.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Cheap liveness probe.
    async fn is_available(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_length: usize,
    temperature: f32,
    top_p: f32,
    rep_pen: f32,
    stop_sequence: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    results: Vec<GeneratedText>,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    text: String,
}

/// HTTP client for the KoboldCpp generation API
/// (`POST /api/v1/generate`, `GET /api/v1/model`).
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemoryError::Llm(format!("failed to build HTTP client: {e}")))?;

        let config = LlmConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            prompt,
            max_length: self.config.max_length,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            rep_pen: self.config.rep_pen,
            stop_sequence: STOP_SEQUENCES,
        };

        debug!(prompt_chars = prompt.len(), "requesting completion");
        let response = self
            .client
            .post(self.endpoint("/api/v1/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| MemoryError::Llm(format!("generation request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MemoryError::Llm(format!(
                "generation endpoint returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Llm(format!("malformed generation response: {e}")))?;

        let text = body
            .results
            .into_iter()
            .next()
            .map(|r| r.text)
            .ok_or_else(|| MemoryError::Llm("generation response carried no results".to_string()))?;

        Ok(text.trim().to_string())
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.endpoint("/api/v1/model")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
