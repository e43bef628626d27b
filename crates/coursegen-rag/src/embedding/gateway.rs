//! Embedding gateway: batching, caching and retry around an [`Embedder`]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::Embedder;
use crate::retry::{RetryFailure, RetryPolicy};
use crate::tokens::TokenCounter;

use super::cache::{normalize_text, CacheKey, Claim, EmbeddingCache, FetchLease, PendingVector};

/// Vectors from one gateway call, tagged with the model that produced them
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub model_version: String,
    /// One vector per input text, same order
    pub vectors: Vec<Vec<f32>>,
}

/// Order-preserving embedding with a shared content-hash cache
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    retry: RetryPolicy,
    counter: Arc<dyn TokenCounter>,
}

impl EmbeddingGateway {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        cache: Arc<EmbeddingCache>,
        retry: RetryPolicy,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            embedder,
            cache,
            retry,
            counter,
        }
    }

    pub fn model_version(&self) -> &str {
        self.embedder.model_version()
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Embed texts, one vector per input in input order
    ///
    /// Every text is checked against the provider input limit before any
    /// provider call is made. Cached texts, duplicates within the call and
    /// texts another call is already fetching are not sent.
    pub async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let model_version = self.embedder.model_version().to_string();
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                model_version,
                vectors: Vec::new(),
            });
        }

        let limit = self.embedder.max_input_tokens();
        for (index, text) in texts.iter().enumerate() {
            let tokens = self.counter.count(text);
            if tokens > limit {
                return Err(Error::InputTooLarge {
                    index,
                    tokens,
                    limit,
                });
            }
        }

        self.cache.ensure_model(&model_version);

        let keys: Vec<CacheKey> = texts
            .iter()
            .map(|text| CacheKey::new(&model_version, text))
            .collect();

        let mut resolved: HashMap<CacheKey, Arc<Vec<f32>>> = HashMap::new();
        let mut seen: HashSet<&CacheKey> = HashSet::new();
        let mut leases: Vec<(FetchLease, String)> = Vec::new();
        let mut waiting: Vec<(PendingVector, String)> = Vec::new();
        for (key, text) in keys.iter().zip(texts) {
            if !seen.insert(key) {
                continue;
            }
            match self.cache.claim(key.clone()) {
                Claim::Cached(vector) => {
                    resolved.insert(key.clone(), vector);
                }
                Claim::Fetch(lease) => leases.push((lease, normalize_text(text))),
                Claim::Wait(pending) => waiting.push((pending, normalize_text(text))),
            }
        }

        tracing::debug!(
            "Embedding {} text(s): {} cached, {} in flight elsewhere, {} to fetch",
            texts.len(),
            resolved.len(),
            waiting.len(),
            leases.len()
        );

        // Leases still held when a fetch fails are released on drop
        let batch_size = self.embedder.max_batch_size().max(1);
        while !leases.is_empty() {
            let batch: Vec<(FetchLease, String)> =
                leases.drain(..batch_size.min(leases.len())).collect();
            let inputs: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = self.fetch(&inputs).await?;

            for ((lease, _), vector) in batch.into_iter().zip(vectors) {
                let key = lease.key().clone();
                resolved.insert(key, self.cache.complete(lease, vector));
            }
        }

        let mut orphaned: Vec<(CacheKey, String)> = Vec::new();
        for (pending, text) in waiting {
            let key = pending.key().clone();
            match pending.wait().await {
                Some(vector) => {
                    resolved.insert(key, vector);
                }
                None => orphaned.push((key, text)),
            }
        }

        // The callers we waited on failed; fetch those texts here
        for batch in orphaned.chunks(batch_size) {
            let inputs: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = self.fetch(&inputs).await?;

            for ((key, _), vector) in batch.iter().zip(vectors) {
                resolved.insert(key.clone(), self.cache.insert(key.clone(), vector));
            }
        }

        let mut vectors = Vec::with_capacity(keys.len());
        for key in &keys {
            let vector = resolved
                .get(key)
                .ok_or_else(|| Error::internal("embedding missing for resolved key"))?;
            vectors.push(vector.as_ref().clone());
        }

        Ok(EmbeddingBatch {
            model_version,
            vectors,
        })
    }

    /// Embed a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.embed(&[text.to_string()]).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("embedding gateway returned no vector"))
    }

    /// One provider batch under the retry policy, with shape checks
    async fn fetch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self
            .retry
            .run("embedding", |_attempt| self.embedder.embed(inputs))
            .await
            .map_err(|failure: RetryFailure| Error::EmbeddingUnavailable {
                attempts: failure.attempts,
                code: Some(failure.last_error.code()),
                reason: failure.last_error.to_string(),
            })?;

        if vectors.len() != inputs.len() {
            return Err(Error::EmbeddingUnavailable {
                attempts: 1,
                code: Some("invalid_response".to_string()),
                reason: format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    inputs.len()
                ),
            });
        }

        let dimensions = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(Error::EmbeddingUnavailable {
                attempts: 1,
                code: Some("invalid_response".to_string()),
                reason: format!(
                    "provider returned a {}-dimensional vector, expected {}",
                    bad.len(),
                    dimensions
                ),
            });
        }

        Ok(vectors)
    }
}
