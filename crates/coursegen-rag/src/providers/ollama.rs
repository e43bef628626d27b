//! Ollama HTTP client implementing both provider traits
//!
//! Retries and per-attempt timeouts are applied by the gateways, so every
//! method here performs exactly one HTTP call and only classifies failures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::{Embedder, Generator, ModelRequest, ProviderError};

/// Ollama API client
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Embedding model name
    embed_model: String,
    /// Generation model name
    generate_model: String,
    /// Expected embedding dimensions
    dimensions: usize,
    batch_size: usize,
    max_input_tokens: usize,
    /// Fallback temperature for requests without one
    temperature: f32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            embed_model: embeddings.model.clone(),
            generate_model: llm.generate_model.clone(),
            dimensions: embeddings.dimensions,
            batch_size: embeddings.batch_size,
            max_input_tokens: embeddings.max_input_tokens,
            temperature: llm.temperature,
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<R, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::Transient(format!("Failed to parse response: {}", e)))
    }
}

fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.is_builder() {
        ProviderError::Rejected {
            code: "invalid_request".to_string(),
            message: err.to_string(),
        }
    } else {
        ProviderError::Transient(err.to_string())
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbedRequest {
            model: &self.embed_model,
            input: texts,
        };
        let response: EmbedResponse = self.post_json("/api/embed", &request).await?;
        Ok(response.embeddings)
    }

    fn model_version(&self) -> &str {
        &self.embed_model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<String, ProviderError> {
        let params = &request.params;
        let body = GenerateRequest {
            model: &self.generate_model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: request.schema.as_ref(),
            options: GenerateOptions {
                temperature: params.temperature.unwrap_or(self.temperature),
                top_p: params.top_p,
                frequency_penalty: params.frequency_penalty,
                presence_penalty: params.presence_penalty,
                num_predict: params.max_output_tokens,
            },
        };

        tracing::debug!("Generating with model: {}", self.generate_model);
        let response: GenerateResponse = self.post_json("/api/generate", &body).await?;

        if response.done_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::Refused(
                "generation stopped by content filter".to_string(),
            ));
        }

        Ok(response.response)
    }

    fn model(&self) -> &str {
        &self.generate_model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
