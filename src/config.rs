use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Two or more settings combine into an unusable configuration.
    #[error("Invalid configuration: {0}")]
    Degenerate(String),
}

/// Runtime configuration for the ragserve process.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional base URL for a local Ollama runtime.
    pub ollama_url: Option<String>,
    /// Chunking strategy applied during ingestion.
    pub chunk_strategy: ChunkStrategy,
    /// Target chunk size in words.
    pub chunk_target_size: usize,
    /// Overlap between adjacent chunks in words. Must stay below the target size.
    pub chunk_overlap_size: usize,
    /// Assumed words-per-sentence used to convert the word overlap into a
    /// sentence count for the sentence-aware strategy.
    pub chunk_overlap_sentence_words: usize,
    /// Number of chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Number of retrieved chunks forwarded to the generation call.
    pub generation_context_chunks: usize,
    /// API key for the generation provider. Queries fail upstream when unset.
    pub generation_api_key: Option<String>,
    /// Chat-completion model identifier.
    pub generation_model: String,
    /// Base URL of the OpenRouter-compatible generation API.
    pub generation_base_url: String,
    /// Request timeout for the generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Minimum extracted-text length before the fallback extractor is tried.
    pub extraction_min_text_length: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the retrieval pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic byte-hashing embedder for offline use and tests.
    Hash,
}

/// Chunk boundary strategy applied during ingestion.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed-width overlapping word windows.
    Fixed,
    /// Sentence-aware greedy packing.
    Sentence,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            chunk_strategy: load_env_optional("CHUNK_STRATEGY")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("CHUNK_STRATEGY".to_string()))
                })
                .transpose()?
                .unwrap_or(ChunkStrategy::Fixed),
            chunk_target_size: load_env_parsed("CHUNK_TARGET_SIZE", 500)?,
            chunk_overlap_size: load_env_parsed("CHUNK_OVERLAP_SIZE", 50)?,
            chunk_overlap_sentence_words: load_env_parsed("CHUNK_OVERLAP_SENTENCE_WORDS", 20)?,
            retrieval_top_k: load_env_parsed("RETRIEVAL_TOP_K", 5)?,
            generation_context_chunks: load_env_parsed("GENERATION_CONTEXT_CHUNKS", 3)?,
            generation_api_key: load_env_optional("OPENROUTER_API_KEY"),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| "openai/gpt-3.5-turbo".to_string()),
            generation_base_url: load_env_optional("GENERATION_BASE_URL")
                .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
            generation_timeout_secs: load_env_parsed("GENERATION_TIMEOUT_SECS", 30)?,
            extraction_min_text_length: load_env_parsed("EXTRACTION_MIN_TEXT_LENGTH", 100)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject setting combinations that would misbehave at runtime rather
    /// than letting them surface mid-request.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Degenerate(
                "EMBEDDING_DIMENSION must be greater than zero".into(),
            ));
        }
        if self.chunk_target_size == 0 {
            return Err(ConfigError::Degenerate(
                "CHUNK_TARGET_SIZE must be greater than zero".into(),
            ));
        }
        // Overlap >= target would make the window step zero and loop forever.
        if self.chunk_overlap_size >= self.chunk_target_size {
            return Err(ConfigError::Degenerate(
                "CHUNK_OVERLAP_SIZE must be smaller than CHUNK_TARGET_SIZE".into(),
            ));
        }
        if self.chunk_overlap_sentence_words == 0 {
            return Err(ConfigError::Degenerate(
                "CHUNK_OVERLAP_SENTENCE_WORDS must be greater than zero".into(),
            ));
        }
        if self.retrieval_top_k == 0 || self.generation_context_chunks == 0 {
            return Err(ConfigError::Degenerate(
                "RETRIEVAL_TOP_K and GENERATION_CONTEXT_CHUNKS must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for ChunkStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "sentence" => Ok(Self::Sentence),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        chunk_strategy = ?config.chunk_strategy,
        chunk_target_size = config.chunk_target_size,
        chunk_overlap_size = config.chunk_overlap_size,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            embedding_provider: EmbeddingProvider::Hash,
            embedding_model: "test-model".into(),
            embedding_dimension: 64,
            ollama_url: None,
            chunk_strategy: ChunkStrategy::Fixed,
            chunk_target_size: 500,
            chunk_overlap_size: 50,
            chunk_overlap_sentence_words: 20,
            retrieval_top_k: 5,
            generation_context_chunks: 3,
            generation_api_key: None,
            generation_model: "openai/gpt-3.5-turbo".into(),
            generation_base_url: "https://openrouter.ai/api/v1".into(),
            generation_timeout_secs: 30,
            extraction_min_text_length: 100,
            server_port: None,
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_target() {
        let mut config = base_config();
        config.chunk_overlap_size = 500;
        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::Degenerate(_)));

        config.chunk_overlap_size = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_dimension() {
        let mut config = base_config();
        config.embedding_dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_and_strategy_parse_case_insensitively() {
        assert!(matches!(
            "Ollama".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Ollama)
        ));
        assert!(matches!(
            "HASH".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Hash)
        ));
        assert!("faiss".parse::<EmbeddingProvider>().is_err());
        assert!(matches!(
            "Sentence".parse::<ChunkStrategy>(),
            Ok(ChunkStrategy::Sentence)
        ));
        assert!("paragraph".parse::<ChunkStrategy>().is_err());
    }
}
