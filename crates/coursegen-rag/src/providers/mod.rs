//! Capability traits for the external model provider
//!
//! The core only ever talks to a provider through [`Embedder`] and
//! [`Generator`], so each can be swapped for a different backend or a test
//! double independently.

pub mod hashing;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Provider failure, classified for the retry policy
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider asked us to slow down
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Attempt exceeded its wall-clock limit
    #[error("request timed out")]
    Timeout,

    /// Temporary failure (network, 5xx)
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Explicit refusal or content-policy block
    #[error("provider refused: {0}")]
    Refused(String),

    /// Malformed request, authentication failure, unknown model, ...
    #[error("provider rejected request ({code}): {message}")]
    Rejected { code: String, message: String },
}

impl ProviderError {
    /// Classify an HTTP error status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited { retry_after: None },
            408 | 500..=599 => Self::Transient(format!("HTTP {}: {}", status, body)),
            _ => Self::Rejected {
                code: status.to_string(),
                message: body,
            },
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::Transient(_)
        )
    }

    /// Server-provided wait hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short code for diagnostics
    pub fn code(&self) -> String {
        match self {
            Self::RateLimited { .. } => "rate_limited".to_string(),
            Self::Timeout => "timeout".to_string(),
            Self::Transient(_) => "transient".to_string(),
            Self::Refused(_) => "refused".to_string(),
            Self::Rejected { code, .. } => code.clone(),
        }
    }
}

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaClient`: local Ollama server (`/api/embed`)
/// - `HashingEmbedder`: offline feature hashing, no network
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; one vector per input, same order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Model identifier; vectors from different versions never mix
    fn model_version(&self) -> &str;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Maximum texts per call
    fn max_batch_size(&self) -> usize {
        32
    }

    /// Maximum tokens per input text
    fn max_input_tokens(&self) -> usize {
        2048
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// A single request to the language model
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// System instruction
    pub system: String,
    /// User prompt
    pub prompt: String,
    /// JSON schema hint for structured output
    pub schema: Option<serde_json::Value>,
    /// Sampling parameters
    pub params: GenerationParams,
}

/// Trait for LLM-based generation
///
/// Implementations:
/// - `OllamaClient`: local Ollama server (`/api/generate`)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the raw model text for a request
    async fn generate(&self, request: &ModelRequest) -> Result<String, ProviderError>;

    /// Model being used
    fn model(&self) -> &str;

    /// Provider name for logging
    fn name(&self) -> &str;
}
