//! Error types for the generation core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDocument,
    InputTooLarge,
    EmbeddingUnavailable,
    Template,
    OutputSchema,
    ModelUnavailable,
    ModelRefusal,
    RequestValidation,
    VectorIndex,
    Config,
    Internal,
}

/// Core errors
#[derive(Debug, Error)]
pub enum Error {
    /// Document is empty or not text
    #[error("Invalid document '{source_id}': {reason}")]
    InvalidDocument { source_id: String, reason: String },

    /// Text exceeds the embedding provider's input limit
    #[error("Input {index} has {tokens} tokens, provider limit is {limit}")]
    InputTooLarge {
        index: usize,
        tokens: usize,
        limit: usize,
    },

    /// Embedding provider failed or retries were exhausted
    #[error("Embedding unavailable after {attempts} attempt(s): {reason}")]
    EmbeddingUnavailable {
        attempts: u32,
        code: Option<String>,
        reason: String,
    },

    /// Template could not be rendered or does not fit the context window
    #[error("Template '{template}' failed: {message}")]
    Template {
        template: String,
        message: String,
        prompt_tokens: Option<usize>,
    },

    /// Model output did not match the task schema, even after repair
    #[error("Model output does not match schema for '{task}' after {repair_attempts} repair attempt(s): {message}")]
    OutputSchema {
        task: String,
        message: String,
        repair_attempts: u32,
    },

    /// Model provider failed or retries were exhausted
    #[error("Model unavailable after {attempts} attempt(s): {reason}")]
    ModelUnavailable {
        attempts: u32,
        code: Option<String>,
        reason: String,
    },

    /// Model explicitly refused (content policy)
    #[error("Model refused the request: {reason}")]
    ModelRefusal { reason: String },

    /// Generation request is missing or has malformed fields
    #[error("Invalid request field '{field}': {reason}")]
    RequestValidation { field: String, reason: String },

    /// Vector index invariant violated (dimensions, model version)
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid document error
    pub fn invalid_document(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a template error without a token count
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
            prompt_tokens: None,
        }
    }

    /// Create a request validation error
    pub fn request_validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            Error::InputTooLarge { .. } => ErrorKind::InputTooLarge,
            Error::EmbeddingUnavailable { .. } => ErrorKind::EmbeddingUnavailable,
            Error::Template { .. } => ErrorKind::Template,
            Error::OutputSchema { .. } => ErrorKind::OutputSchema,
            Error::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            Error::ModelRefusal { .. } => ErrorKind::ModelRefusal,
            Error::RequestValidation { .. } => ErrorKind::RequestValidation,
            Error::VectorIndex(_) => ErrorKind::VectorIndex,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
