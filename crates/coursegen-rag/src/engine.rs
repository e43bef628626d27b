//! Wiring of the ingestion and generation pipelines around shared state

use std::sync::Arc;
use uuid::Uuid;

use crate::config::{EmbeddingProviderKind, RagConfig};
use crate::embedding::{CacheStats, EmbeddingCache, EmbeddingGateway};
use crate::error::Result;
use crate::generation::{GenerationOrchestrator, ModelGateway};
use crate::index::{DistanceMetric, IndexConfig, InMemoryVectorIndex, VectorIndex};
use crate::ingestion::{Chunker, DocumentStore, IngestReport, Ingestor};
use crate::prompt::PromptAssembler;
use crate::providers::{Embedder, Generator, HashingEmbedder, OllamaClient};
use crate::retrieval::Retriever;
use crate::tasks::TaskRegistry;
use crate::tokens::{TokenCounter, UnicodeTokenCounter};
use crate::types::{Document, GenerationRequest, GenerationResponse, GenerationResult, RawDocument};

/// Shared handle to a configured generation core
#[derive(Clone)]
pub struct CourseGen {
    inner: Arc<CourseGenInner>,
}

struct CourseGenInner {
    config: RagConfig,
    ingestor: Ingestor,
    orchestrator: GenerationOrchestrator,
    index: Arc<dyn VectorIndex>,
    cache: Arc<EmbeddingCache>,
}

impl CourseGen {
    /// Build against the providers named in `config`
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let ollama = Arc::new(OllamaClient::new(&config.llm, &config.embeddings)?);

        let embedder: Arc<dyn Embedder> = match config.embeddings.provider {
            EmbeddingProviderKind::Ollama => {
                tracing::info!("Using Ollama embeddings ({})", config.embeddings.model);
                ollama.clone()
            }
            EmbeddingProviderKind::Hashing => {
                tracing::info!(
                    "Using offline hashing embeddings ({} dimensions)",
                    config.embeddings.dimensions
                );
                Arc::new(HashingEmbedder::new(config.embeddings.dimensions))
            }
        };

        Self::new(config, embedder, ollama)
    }

    /// Build with explicit providers
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = TaskRegistry::from_config(&config.tasks)?;

        let counter: Arc<dyn TokenCounter> = Arc::new(UnicodeTokenCounter);
        let cache = Arc::new(EmbeddingCache::new());
        let gateway = Arc::new(EmbeddingGateway::new(
            embedder.clone(),
            cache.clone(),
            config.retry.embedding.clone(),
            counter.clone(),
        ));

        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new(IndexConfig {
            dimensions: embedder.dimensions(),
            metric: DistanceMetric::Cosine,
            model_version: embedder.model_version().to_string(),
        }));

        let ingestor = Ingestor::new(
            Arc::new(DocumentStore::new()),
            Chunker::from_config(&config.chunking, counter.clone())?,
            gateway.clone(),
            index.clone(),
        )?;

        let orchestrator = GenerationOrchestrator::new(
            registry,
            Retriever::new(gateway, index.clone(), config.retrieval.clone()),
            PromptAssembler::new(counter, config.prompt.clone()),
            ModelGateway::new(generator.clone(), config.retry.generation.clone()),
        )
        .with_default_temperature(config.llm.temperature);

        tracing::info!(
            "Generation core ready: {} embeddings, {} generation, {} task(s)",
            embedder.name(),
            generator.model(),
            orchestrator.registry().len()
        );

        Ok(Self {
            inner: Arc::new(CourseGenInner {
                config,
                ingestor,
                orchestrator,
                index,
                cache,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Registered task ids
    pub fn tasks(&self) -> Vec<String> {
        self.inner.orchestrator.registry().ids()
    }

    pub async fn ingest(&self, raw: &RawDocument) -> Result<IngestReport> {
        self.inner.ingestor.ingest(raw).await
    }

    /// Ingest several documents concurrently
    pub async fn ingest_all(&self, raws: &[RawDocument]) -> Vec<Result<IngestReport>> {
        self.inner.ingestor.ingest_all(raws).await
    }

    pub async fn ingest_blocks(&self, raw: &RawDocument, tag: &str) -> Result<Vec<IngestReport>> {
        self.inner.ingestor.ingest_blocks(raw, tag).await
    }

    /// Remove a document and its chunks
    pub async fn retire(&self, document_id: &Uuid) -> Result<usize> {
        self.inner.ingestor.retire(document_id).await
    }

    /// Drop the stored document but keep its chunks searchable
    pub fn purge(&self, document_id: &Uuid) -> Option<Document> {
        self.inner.ingestor.purge(document_id)
    }

    pub fn document(&self, document_id: &Uuid) -> Option<Document> {
        self.inner.ingestor.store().get(document_id)
    }

    pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.inner.orchestrator.submit(request).await
    }

    /// Submit and fold the outcome into a response envelope
    pub async fn respond(&self, request: GenerationRequest) -> GenerationResponse {
        GenerationResponse::from(self.submit(request).await)
    }

    /// Chunks currently indexed
    pub async fn indexed_chunks(&self) -> Result<usize> {
        self.inner.index.len().await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}
