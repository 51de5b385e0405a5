//! Generation backend boundary. The backend is a black-box remote service:
//! a prompt and options go in, text or a typed failure comes out. A failure
//! never leaves partial state behind — the orchestrator only persists on
//! success.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::GenerationConfig;

/// Typed generation failure. Distinct kinds so the caller can tell a
/// timeout from a transport fault from a content rejection.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("content rejected by backend: {0}")]
    RejectedContent(String),
}

/// LLM text generation seam for the drafting pipeline.
pub trait PlanGenerator {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, GenerationFailure>;
}

/// Generator backed by an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    system: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self, GenerationFailure> {
        // No client-level timeout: the per-request deadline comes from
        // each call's GenerationConfig.
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| GenerationFailure::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            system: super::prompt::PLAN_SYSTEM_PROMPT.to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl PlanGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, GenerationFailure> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: &self.system,
            stream: false,
            options: GenerateOptions {
                num_predict: config.max_output_tokens,
                temperature: config.temperature.clamp(0.0, 1.0),
                top_p: config.top_p.clamp(0.0, 1.0),
            },
        };

        let response = self
            .client
            .post(&url)
            .timeout(config.timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationFailure::Timeout(config.timeout)
                } else {
                    GenerationFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            // 4xx from the backend means it refused the request content;
            // everything else is a transport-level fault.
            if status.is_client_error() {
                return Err(GenerationFailure::RejectedContent(format!(
                    "{status}: {body}"
                )));
            }
            return Err(GenerationFailure::Transport(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GenerationFailure::Transport(e.to_string()))?;

        tracing::debug!(model = %self.model, chars = parsed.response.len(), "generation complete");
        Ok(parsed.response)
    }
}
