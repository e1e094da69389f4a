//! Query embedding for dense-vector search.
//!
//! The provider is a trait seam: HTTP providers (Ollama, OpenAI-compatible)
//! for real deployments, and a deterministic hash-based fallback for tests
//! and offline use. Provider failure aborts retrieval for the current hook
//! without a diagnostic (cold starts are expected).

mod fallback;
mod http;

pub use fallback::HashEmbedder;
pub use http::{OllamaEmbedder, OpenAiEmbedder};

use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Default embedding dimensions when the config does not say otherwise.
pub const DEFAULT_DIMENSIONS: usize = 768;

/// Trait for query embedding providers.
pub trait QueryEmbedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Embeds a query prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmbeddingUnavailable`] when the provider
    /// cannot produce a vector.
    fn embed_query(&self, prompt: &str) -> Result<Vec<f32>>;
}

/// Creates the embedder selected by `embedding.provider`.
///
/// Unknown providers fall back to the hash embedder so a misconfigured
/// vault still gets keyword-quality retrieval instead of none.
#[must_use]
pub fn create_embedder(config: &Config) -> Box<dyn QueryEmbedder> {
    let dimensions = if config.embedding.dimensions == 0 {
        DEFAULT_DIMENSIONS
    } else {
        config.embedding.dimensions
    };
    match config.embedding.provider.as_str() {
        "ollama" => Box::new(OllamaEmbedder::new(
            config.ollama.url.clone(),
            config.embedding.model.clone(),
            dimensions,
        )),
        "openai" => Box::new(OpenAiEmbedder::new(
            config.embedding.api_key.clone(),
            config.embedding.model.clone(),
            dimensions,
        )),
        _ => Box::new(HashEmbedder::new(dimensions)),
    }
}

/// Validates a provider response vector against the expected dimensions.
pub(crate) fn check_dimensions(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if vector.len() == expected {
        Ok(vector)
    } else {
        Err(PipelineError::DimensionsMismatch {
            expected,
            got: vector.len(),
        }
        .into())
    }
}
