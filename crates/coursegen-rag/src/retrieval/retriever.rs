//! Budgeted passage retrieval

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingGateway;
use crate::error::Result;
use crate::index::{MetadataFilter, VectorIndex};
use crate::types::{RetrievalResult, ScoredChunk};

/// Ranks, deduplicates and packs passages for a query
pub struct Retriever {
    gateway: Arc<EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        gateway: Arc<EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            gateway,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve with the configured budget and candidate count
    pub async fn retrieve_default(
        &self,
        query_text: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult> {
        self.retrieve_filtered(
            query_text,
            self.config.token_budget,
            self.config.top_k_candidates,
            filter,
        )
        .await
    }

    /// Retrieve passages whose total token count fits `token_budget`
    pub async fn retrieve(
        &self,
        query_text: &str,
        token_budget: usize,
        top_k_candidates: usize,
    ) -> Result<RetrievalResult> {
        self.retrieve_filtered(query_text, token_budget, top_k_candidates, None)
            .await
    }

    /// Retrieve restricted to entries matching `filter`
    ///
    /// Passages are taken best-first and packing stops at the first one
    /// that would exceed the budget, so a lower-scored passage never
    /// displaces a higher-scored one.
    pub async fn retrieve_filtered(
        &self,
        query_text: &str,
        token_budget: usize,
        top_k_candidates: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult> {
        if self.index.is_empty().await? {
            tracing::debug!("Index is empty, skipping retrieval");
            return Ok(RetrievalResult::empty());
        }
        if query_text.trim().is_empty() || top_k_candidates == 0 {
            return Ok(RetrievalResult::empty());
        }

        let query_embedding = self.gateway.embed_one(query_text).await?;
        let hits = self
            .index
            .query(&query_embedding, top_k_candidates, filter)
            .await?;
        let candidates_considered = hits.len();

        let mut seen = HashSet::new();
        let mut passages = Vec::new();
        let mut total_tokens = 0usize;

        for hit in hits {
            if let Some(min) = self.config.min_similarity {
                if hit.score < min {
                    // Hits are sorted, nothing further can qualify
                    break;
                }
            }

            let dedupe_key = if self.config.dedupe_by_document {
                hit.entry.document_id()
            } else {
                hit.chunk_id
            };
            if !seen.insert(dedupe_key) {
                continue;
            }

            let tokens = hit.entry.chunk.token_count;
            if total_tokens + tokens > token_budget {
                break;
            }

            total_tokens += tokens;
            passages.push(ScoredChunk {
                chunk: hit.entry.chunk.clone(),
                score: hit.score,
            });
        }

        tracing::debug!(
            "Retrieved {} passage(s), {} tokens of {} budget, from {} candidates",
            passages.len(),
            total_tokens,
            token_budget,
            candidates_considered
        );

        Ok(RetrievalResult {
            passages,
            total_tokens,
            candidates_considered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingCache;
    use crate::index::{DistanceMetric, IndexConfig, IndexEntry, InMemoryVectorIndex};
    use crate::providers::HashingEmbedder;
    use crate::retry::RetryPolicy;
    use crate::tokens::UnicodeTokenCounter;
    use crate::types::{Chunk, ChunkSource};
    use std::collections::HashMap;
    use uuid::Uuid;

    const DIMS: usize = 512;

    struct Fixture {
        embedder: Arc<HashingEmbedder>,
        index: Arc<InMemoryVectorIndex>,
        gateway: Arc<EmbeddingGateway>,
    }

    fn fixture() -> Fixture {
        let embedder = Arc::new(HashingEmbedder::new(DIMS));
        let index = Arc::new(InMemoryVectorIndex::new(IndexConfig {
            dimensions: DIMS,
            metric: DistanceMetric::Cosine,
            model_version: format!("hashing-v1-{}", DIMS),
        }));
        let gateway = Arc::new(EmbeddingGateway::new(
            embedder.clone(),
            Arc::new(EmbeddingCache::new()),
            RetryPolicy::immediate(1),
            Arc::new(UnicodeTokenCounter),
        ));
        Fixture {
            embedder,
            index,
            gateway,
        }
    }

    impl Fixture {
        fn retriever(&self, config: RetrievalConfig) -> Retriever {
            Retriever::new(self.gateway.clone(), self.index.clone(), config)
        }

        async fn add(&self, document: Uuid, index: u32, content: &str, tokens: usize) {
            let chunk = Chunk {
                id: Chunk::stable_id(&document, index, content),
                document_id: document,
                chunk_index: index,
                content: content.to_string(),
                char_start: 0,
                char_end: content.len(),
                token_count: tokens,
                source: ChunkSource::default(),
                metadata: HashMap::new(),
            };
            let embedding = self.embedder.embed_text(content);
            self.index
                .upsert(vec![IndexEntry::new(chunk, embedding, format!("hashing-v1-{}", DIMS))])
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_result() {
        let fx = fixture();
        let result = fx
            .retriever(RetrievalConfig::default())
            .retrieve("anything at all", 100, 5)
            .await
            .unwrap();

        assert!(result.is_empty());
        // No embedding work was done
        assert_eq!(fx.gateway.cache().stats().misses, 0);
    }

    #[tokio::test]
    async fn test_budget_is_never_exceeded() {
        let fx = fixture();
        let doc = Uuid::new_v4();
        fx.add(doc, 0, "volcano eruption lava", 40).await;
        fx.add(doc, 1, "volcano ash cloud", 40).await;
        fx.add(doc, 2, "volcano magma chamber", 40).await;

        let retriever = fx.retriever(RetrievalConfig::default());
        for budget in [0, 39, 40, 79, 80, 200] {
            let result = retriever.retrieve("volcano", budget, 10).await.unwrap();
            assert!(result.total_tokens <= budget);
            assert_eq!(result.len(), budget.min(120) / 40);
            assert_eq!(
                result.total_tokens,
                result.passages.iter().map(|p| p.chunk.token_count).sum::<usize>()
            );
        }
    }

    #[tokio::test]
    async fn test_packing_stops_at_first_overflow() {
        let fx = fixture();
        let doc = Uuid::new_v4();
        fx.add(doc, 0, "glacier ice", 10).await;
        fx.add(doc, 1, "glacier ice sheet", 50).await;
        fx.add(doc, 2, "glacier valley moraine formation", 5).await;

        let result = fx
            .retriever(RetrievalConfig::default())
            .retrieve("glacier ice", 30, 10)
            .await
            .unwrap();

        // Best match fits, the second overflows, the small third is not used
        assert_eq!(result.len(), 1);
        assert_eq!(result.passages[0].chunk.content, "glacier ice");
        assert!(result.passages.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_dedupe_by_document() {
        let fx = fixture();
        let (doc_a, doc_b) = (Uuid::new_v4(), Uuid::new_v4());
        fx.add(doc_a, 0, "mitochondria energy", 5).await;
        fx.add(doc_a, 1, "mitochondria membrane energy", 5).await;
        fx.add(doc_b, 0, "mitochondria structure", 5).await;

        let config = RetrievalConfig {
            dedupe_by_document: true,
            ..RetrievalConfig::default()
        };
        let result = fx.retriever(config).retrieve("mitochondria", 100, 10).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.candidates_considered, 3);
        assert_ne!(result.passages[0].chunk.document_id, result.passages[1].chunk.document_id);
    }

    #[tokio::test]
    async fn test_min_similarity_drops_weak_matches() {
        let fx = fixture();
        let doc = Uuid::new_v4();
        fx.add(doc, 0, "tectonic plates", 5).await;
        fx.add(doc, 1, "baroque music", 5).await;

        let config = RetrievalConfig {
            min_similarity: Some(0.3),
            ..RetrievalConfig::default()
        };
        let result = fx.retriever(config).retrieve("tectonic plates", 100, 10).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.passages[0].chunk.content, "tectonic plates");
    }
}
