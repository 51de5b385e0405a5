//! Embedding service boundary. The pipeline never invents evidence: if
//! the service is unreachable, retrieval fails rather than degrading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EMBEDDING_DIM;

#[derive(Debug, Error)]
#[error("embedding request failed: {0}")]
pub struct EmbeddingError(pub String);

/// Converts free text into a fixed-length vector. Stored and query
/// embeddings must come from the same model.
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn dimension(&self) -> usize;
}

/// Allow `Box<dyn EmbeddingModel>` to be used as `&impl EmbeddingModel`.
impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// HTTP embedder backed by an Ollama-compatible `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EmbeddingError(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| EmbeddingError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError(format!(
                "embedding backend returned {status}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .map_err(|e| EmbeddingError(e.to_string()))?;

        if parsed.embedding.len() != EMBEDDING_DIM {
            return Err(EmbeddingError(format!(
                "model returned {} dimensions, store requires {EMBEDDING_DIM}",
                parsed.embedding.len()
            )));
        }

        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}
