use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Turns text into an embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider backed by a local Ollama server.
pub struct OllamaClient {
    client: Client,
    host: String,
    model: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.host)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("request to Ollama failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "Ollama returned HTTP {}: {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("unreadable Ollama response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(AppError::Embedding(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", DEFAULT_EMBEDDING_MODEL).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/embeddings");
        assert_eq!(client.model(), "nomic-embed-text");
    }

    #[test]
    fn request_uses_ollama_field_names() {
        let request = EmbeddingRequest {
            model: "m",
            prompt: "hello",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m", "prompt": "hello"}));
    }

    #[test]
    fn response_parses_float_array() {
        let body: EmbeddingResponse =
            serde_json::from_str(r#"{"embedding": [0.5, -0.25, 1e-3]}"#).unwrap();
        assert_eq!(body.embedding.len(), 3);
        assert_eq!(body.embedding[1], -0.25);
    }
}
