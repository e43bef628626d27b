//! Configuration for the generation core

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::tasks::TaskTemplate;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt budget configuration
    pub prompt: PromptConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retry policies for the external gateways
    pub retry: RetryConfig,
    /// Extra task templates on top of the built-in ones
    pub tasks: Vec<TaskTemplate>,
}

impl RagConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(Error::config("chunking.max_tokens must be > 0"));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return Err(Error::config(
                "chunking.overlap_tokens must be smaller than chunking.max_tokens",
            ));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be > 0"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be > 0"));
        }
        if self.chunking.max_tokens > self.embeddings.max_input_tokens {
            return Err(Error::config(format!(
                "chunking.max_tokens ({}) exceeds embeddings.max_input_tokens ({})",
                self.chunking.max_tokens, self.embeddings.max_input_tokens
            )));
        }
        if self.retrieval.top_k_candidates == 0 {
            return Err(Error::config("retrieval.top_k_candidates must be >= 1"));
        }
        if let Some(min) = self.retrieval.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                return Err(Error::config("retrieval.min_similarity must be in [-1.0, 1.0]"));
            }
        }
        if self.prompt.completion_reserve >= self.prompt.context_limit {
            return Err(Error::config(
                "prompt.completion_reserve must be smaller than prompt.context_limit",
            ));
        }
        if self.retrieval.token_budget >= self.prompt.prompt_budget() {
            return Err(Error::config(format!(
                "retrieval.token_budget ({}) leaves no room for the template within the prompt budget ({})",
                self.retrieval.token_budget,
                self.prompt.prompt_budget()
            )));
        }
        self.retry.embedding.validate("retry.embedding")?;
        self.retry.generation.validate("retry.generation")?;
        for task in &self.tasks {
            task.validate()?;
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub max_tokens: usize,
    /// Tokens shared by consecutive chunks
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            overlap_tokens: 32,
        }
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Ollama `/api/embed`
    #[default]
    Ollama,
    /// Offline feature-hashing embedder
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider produces vectors
    pub provider: EmbeddingProviderKind,
    /// Model name; also the cache and index model version
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Maximum texts per provider call
    pub batch_size: usize,
    /// Provider input limit in tokens
    pub max_input_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            max_input_tokens: 2048,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Token budget for retrieved passages
    pub token_budget: usize,
    /// Nearest neighbours fetched before dedupe and packing
    pub top_k_candidates: usize,
    /// Keep only the best chunk per source document
    pub dedupe_by_document: bool,
    /// Drop candidates scoring below this similarity
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            token_budget: 1500,
            top_k_candidates: 20,
            dedupe_by_document: false,
            min_similarity: None,
        }
    }
}

/// Prompt window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Model context window (tokens)
    pub context_limit: usize,
    /// Tokens reserved for the completion
    pub completion_reserve: usize,
}

impl PromptConfig {
    /// Tokens available to the prompt itself
    pub fn prompt_budget(&self) -> usize {
        self.context_limit.saturating_sub(self.completion_reserve)
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_limit: 8192,
            completion_reserve: 2048,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Default temperature when a task does not set one
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.1:8b".to_string(),
            temperature: 0.5,
        }
    }
}

/// Retry policies, one per external gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub embedding: RetryPolicy,
    pub generation: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            embedding: RetryPolicy::default(),
            generation: RetryPolicy {
                attempt_timeout_ms: 120_000,
                ..RetryPolicy::default()
            },
        }
    }
}
