//! Vector index contract for chunk embeddings

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::types::Chunk;

pub use memory::InMemoryVectorIndex;

/// Similarity metric, fixed when an index is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in [-1, 1]
    #[default]
    Cosine,
    /// Raw dot product
    DotProduct,
}

impl DistanceMetric {
    /// Similarity between two equal-length vectors, higher is closer
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            DistanceMetric::DotProduct => dot,
            DistanceMetric::Cosine => {
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
        }
    }
}

/// Fixed properties of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Embedding dimensions
    pub dimensions: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Embedding model every entry must come from
    pub model_version: String,
}

/// A stored chunk vector; replaced as a whole, never mutated
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub model_version: String,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, embedding: Vec<f32>, model_version: impl Into<String>) -> Self {
        Self {
            chunk,
            embedding,
            model_version: model_version.into(),
        }
    }

    pub fn chunk_id(&self) -> Uuid {
        self.chunk.id
    }

    pub fn document_id(&self) -> Uuid {
        self.chunk.document_id
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.chunk.metadata
    }
}

/// One query match
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk_id: Uuid,
    pub score: f32,
    /// Entry as it was when the query ran
    pub entry: Arc<IndexEntry>,
}

/// Restricts which entries a query may return
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilter {
    /// Every pair must be present with an equal value
    pub metadata: HashMap<String, String>,
    /// Only these documents, when set
    pub document_ids: Option<Vec<Uuid>>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a metadata pair
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Restrict to a set of documents
    pub fn with_documents(mut self, document_ids: Vec<Uuid>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    /// Check whether an entry passes the filter
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        if let Some(ids) = &self.document_ids {
            if !ids.contains(&entry.document_id()) {
                return false;
            }
        }

        self.metadata
            .iter()
            .all(|(key, value)| entry.metadata().get(key) == Some(value))
    }
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `InMemoryVectorIndex`: exact search over `Arc` entries behind a lock
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace entries by chunk id
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Delete entries by chunk id, returning how many existed
    async fn delete(&self, chunk_ids: &[Uuid]) -> Result<usize>;

    /// Delete all entries for a document
    async fn delete_document(&self, document_id: &Uuid) -> Result<usize>;

    /// At most `k` hits by descending similarity, earlier insertions first on ties
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexHit>>;

    /// Look up one entry
    async fn get(&self, chunk_id: &Uuid) -> Result<Option<Arc<IndexEntry>>>;

    /// Number of entries
    async fn len(&self) -> Result<usize>;

    /// Check if the index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Fixed index properties
    fn config(&self) -> &IndexConfig;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
