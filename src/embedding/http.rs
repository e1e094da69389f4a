//! HTTP embedding providers.
//!
//! Blocking calls with short timeouts: the embedding round-trip is the
//! dominant suspension point of the hook, and the 10 s hook timeout is
//! sized around it.

use super::{QueryEmbedder, check_dimensions};
use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Connect/read timeout for embedding calls.
const EMBED_TIMEOUT: Duration = Duration::from_secs(8);

/// Ollama embedding provider (`POST /api/embeddings`).
pub struct OllamaEmbedder {
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Creates a provider against the given base URL.
    #[must_use]
    pub fn new(url: String, model: String, dimensions: usize) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            dimensions,
        }
    }
}

fn extract_f32s(value: &serde_json::Value) -> Option<Vec<f32>> {
    value.as_array().map(|arr| {
        arr.iter()
            .filter_map(serde_json::Value::as_f64)
            .map(|v| {
                #[allow(clippy::cast_possible_truncation)]
                let f = v as f32;
                f
            })
            .collect()
    })
}

impl QueryEmbedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_query(&self, prompt: &str) -> Result<Vec<f32>> {
        let endpoint = format!("{}/api/embeddings", self.url);
        let response = ureq::post(&endpoint)
            .timeout(EMBED_TIMEOUT)
            .send_json(ureq::json!({
                "model": self.model,
                "prompt": prompt,
            }))
            .map_err(|e| PipelineError::EmbeddingUnavailable(e.to_string()))?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| PipelineError::EmbeddingUnavailable(e.to_string()))?;
        let vector = extract_f32s(&body["embedding"])
            .ok_or_else(|| PipelineError::EmbeddingUnavailable("no embedding field".to_string()))?;
        check_dimensions(vector, self.dimensions)
    }
}

/// OpenAI-compatible embedding provider (`POST /v1/embeddings`).
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Creates a provider with the given bearer key.
    #[must_use]
    pub fn new(api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            api_key,
            model,
            dimensions,
        }
    }
}

impl QueryEmbedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_query(&self, prompt: &str) -> Result<Vec<f32>> {
        let response = ureq::post("https://api.openai.com/v1/embeddings")
            .timeout(EMBED_TIMEOUT)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(ureq::json!({
                "model": self.model,
                "input": prompt,
            }))
            .map_err(|e| PipelineError::EmbeddingUnavailable(e.to_string()))?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| PipelineError::EmbeddingUnavailable(e.to_string()))?;
        let vector = extract_f32s(&body["data"][0]["embedding"])
            .ok_or_else(|| PipelineError::EmbeddingUnavailable("no embedding field".to_string()))?;
        check_dimensions(vector, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_f32s() {
        let value = serde_json::json!([0.5, -1.0, 2.0]);
        assert_eq!(extract_f32s(&value), Some(vec![0.5, -1.0, 2.0]));
        assert_eq!(extract_f32s(&serde_json::json!("nope")), None);
    }

    #[test]
    fn test_ollama_url_normalized() {
        let embedder = OllamaEmbedder::new(
            "http://localhost:11434/".to_string(),
            "nomic-embed-text".to_string(),
            768,
        );
        assert_eq!(embedder.url, "http://localhost:11434");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[test]
    fn test_unreachable_provider_reports_unavailable() {
        // Port 9 (discard) refuses connections in practice; the provider
        // must map transport failure to EmbeddingUnavailable.
        let embedder = OllamaEmbedder::new(
            "http://127.0.0.1:9".to_string(),
            "nomic-embed-text".to_string(),
            768,
        );
        let err = embedder.embed_query("hello").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Pipeline(PipelineError::EmbeddingUnavailable(_))
        ));
    }
}
