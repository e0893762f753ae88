//! Embedding client abstraction and providers.
//!
//! Embedding-space consistency is a hard precondition of the retrieval core: every stored
//! chunk and every query must be embedded by the same model version, or similarity scores
//! silently lose their meaning. One client is therefore constructed at process start and
//! injected into the retriever; nothing else creates embedding clients.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding provider backed by a local Ollama runtime.
pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    /// Connect to the Ollama runtime at `url` (or the library default when unset).
    pub fn new(url: Option<&str>, model: &str) -> Result<Self, EmbeddingClientError> {
        let client = match url {
            Some(url) => Ollama::try_new(url)
                .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?,
            None => Ollama::default(),
        };
        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(model = %self.model, batch = texts.len(), "Generating embeddings");
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        Ok(response.embeddings)
    }
}

/// Deterministic byte-hashing embedder.
///
/// Folds the input bytes into a fixed-dimensionality vector. The result is stable across
/// runs and identical texts map to identical vectors, which is all the offline and test
/// paths need; it carries no semantic signal and is not a substitute for a real model.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a hashing embedder producing vectors of the given dimensionality.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (position, byte) in text.bytes().enumerate() {
            let slot = (position + usize::from(byte)) % dimension;
            embedding[slot] += f32::from(byte) / 255.0;
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

/// Build the embedding client selected by configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaClient::new(
            config.ollama_url.as_deref(),
            &config.embedding_model,
        )?)),
        EmbeddingProvider::Hash => Ok(Box::new(HashEmbeddingClient::new(
            config.embedding_dimension,
        ))),
    }
}
