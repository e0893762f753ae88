//! Generation boundary: conditioning a chat-completion model on retrieved context.
//!
//! The retrieval core's only obligation here is to hand over at most a few top-ranked
//! chunks; everything past that point (prompting, transport, timeouts) belongs to this
//! boundary. The HTTP client is built once and pooled for the process lifetime rather
//! than constructed per call.

use crate::config::Config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key is configured for the generation provider.
    #[error("generation API key is not configured")]
    MissingApiKey,
    /// The request exceeded the configured timeout.
    #[error("generation request timed out")]
    Timeout,
    /// The provider responded with a non-success status.
    #[error("generation API returned status {0}")]
    Status(u16),
    /// Transport-level failure talking to the provider.
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The provider's response body did not contain a completion.
    #[error("generation response was malformed: {0}")]
    MalformedResponse(String),
}

/// Interface implemented by answer generators.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate an answer to `question` grounded in the supplied context chunks.
    async fn generate_answer(
        &self,
        question: &str,
        context_chunks: &[String],
    ) -> Result<String, GenerationError>;
}

/// Chat-completion client for OpenRouter-compatible APIs.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenRouterClient {
    /// Build a client from configuration with a pooled HTTP transport.
    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.generation_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.generation_api_key.clone(),
            base_url: config.generation_base_url.trim_end_matches('/').to_string(),
            model: config.generation_model.clone(),
        })
    }
}

#[async_trait]
impl GenerationClient for OpenRouterClient {
    async fn generate_answer(
        &self,
        question: &str,
        context_chunks: &[String],
    ) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::MissingApiKey);
        };

        let prompt = build_prompt(question, context_chunks);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: 200,
            temperature: 0.7,
            top_p: 0.9,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Transport(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::MalformedResponse(err.to_string()))?;
        let answer = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices returned".into()))?;

        Ok(answer.trim().to_string())
    }
}

/// Assemble the augmented-generation prompt.
///
/// Context and question are kept clearly separated, and the model is told to admit when
/// the context does not contain the answer instead of inventing one.
pub fn build_prompt(question: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n");
    format!(
        "Context from documents:\n{context}\n\n\
         Question: {question}\n\n\
         Please answer the question based on the provided context. \
         If the context doesn't contain enough information to answer fully, \
         say so rather than making up information."
    )
}
