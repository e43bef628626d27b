//! In-memory exact vector index
//!
//! Entries are immutable `Arc`s. Writers swap whole entries under the write
//! lock, so a concurrent query sees either the old or the new entry for any
//! chunk, never a partial one.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::{IndexConfig, IndexEntry, IndexHit, MetadataFilter, VectorIndex};

struct Slot {
    /// Insertion sequence, used to break score ties
    seq: u64,
    entry: Arc<IndexEntry>,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<Uuid, Slot>,
    /// Mapping from document IDs to chunk IDs for efficient deletion
    document_chunks: HashMap<Uuid, HashSet<Uuid>>,
    next_seq: u64,
}

impl IndexState {
    fn remove(&mut self, chunk_id: &Uuid) -> bool {
        let Some(slot) = self.entries.remove(chunk_id) else {
            return false;
        };

        let document_id = slot.entry.document_id();
        if let Some(chunks) = self.document_chunks.get_mut(&document_id) {
            chunks.remove(chunk_id);
            if chunks.is_empty() {
                self.document_chunks.remove(&document_id);
            }
        }
        true
    }
}

/// Brute-force index suitable for course-sized corpora
pub struct InMemoryVectorIndex {
    config: IndexConfig,
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    /// Create an empty index
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            state: RwLock::new(IndexState::default()),
        }
    }

    fn check_entry(&self, entry: &IndexEntry) -> Result<()> {
        if entry.model_version != self.config.model_version {
            return Err(Error::vector_index(format!(
                "chunk {} was embedded with '{}', index holds '{}'",
                entry.chunk_id(),
                entry.model_version,
                self.config.model_version
            )));
        }
        if entry.embedding.len() != self.config.dimensions {
            return Err(Error::vector_index(format!(
                "chunk {} has {} dimensions, index expects {}",
                entry.chunk_id(),
                entry.embedding.len(),
                self.config.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        // Validate the whole batch before touching the index
        for entry in &entries {
            self.check_entry(entry)?;
        }

        let count = entries.len();
        let mut state = self.state.write();

        for entry in entries {
            let chunk_id = entry.chunk_id();
            let document_id = entry.document_id();

            // A chunk that moved documents must leave its old mapping
            state.remove(&chunk_id);

            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .document_chunks
                .entry(document_id)
                .or_default()
                .insert(chunk_id);
            state.entries.insert(
                chunk_id,
                Slot {
                    seq,
                    entry: Arc::new(entry),
                },
            );
        }

        tracing::debug!("Upserted {} entries ({} total)", count, state.entries.len());
        Ok(count)
    }

    async fn delete(&self, chunk_ids: &[Uuid]) -> Result<usize> {
        let mut state = self.state.write();
        Ok(chunk_ids.iter().filter(|id| state.remove(id)).count())
    }

    async fn delete_document(&self, document_id: &Uuid) -> Result<usize> {
        let mut state = self.state.write();
        let chunk_ids: Vec<Uuid> = state
            .document_chunks
            .get(document_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        let removed = chunk_ids.iter().filter(|id| state.remove(id)).count();
        tracing::debug!("Deleted {} entries for document {}", removed, document_id);
        Ok(removed)
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexHit>> {
        if embedding.len() != self.config.dimensions {
            return Err(Error::vector_index(format!(
                "query has {} dimensions, index expects {}",
                embedding.len(),
                self.config.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, u64, Arc<IndexEntry>)> = {
            let state = self.state.read();
            state
                .entries
                .values()
                .filter(|slot| filter.map_or(true, |f| f.matches(&slot.entry)))
                .map(|slot| {
                    let score = self.config.metric.similarity(embedding, &slot.entry.embedding);
                    (score, slot.seq, Arc::clone(&slot.entry))
                })
                .collect()
        };

        let scored_count = scored.len();
        scored.retain(|(score, _, _)| score.is_finite());
        if scored.len() < scored_count {
            tracing::warn!(
                "Skipped {} entries with non-finite similarity",
                scored_count - scored.len()
            );
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, entry)| IndexHit {
                chunk_id: entry.chunk_id(),
                score,
                entry,
            })
            .collect())
    }

    async fn get(&self, chunk_id: &Uuid) -> Result<Option<Arc<IndexEntry>>> {
        Ok(self
            .state
            .read()
            .entries
            .get(chunk_id)
            .map(|slot| Arc::clone(&slot.entry)))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().entries.len())
    }

    fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DistanceMetric;
    use crate::types::{Chunk, ChunkSource};

    fn index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::new(IndexConfig {
            dimensions: 2,
            metric: DistanceMetric::Cosine,
            model_version: "m1".to_string(),
        })
    }

    fn entry(document: Uuid, index: u32, embedding: Vec<f32>) -> IndexEntry {
        let content = format!("chunk {}", index);
        let chunk = Chunk {
            id: Chunk::stable_id(&document, index, &content),
            document_id: document,
            chunk_index: index,
            char_start: 0,
            char_end: content.len(),
            token_count: 2,
            content,
            source: ChunkSource::default(),
            metadata: HashMap::from([("unit".to_string(), format!("u{}", index % 2))]),
        };
        IndexEntry::new(chunk, embedding, "m1")
    }

    #[tokio::test]
    async fn test_query_bound_and_order() {
        let index = index();
        let doc = Uuid::new_v4();
        index
            .upsert(vec![
                entry(doc, 0, vec![1.0, 0.0]),
                entry(doc, 1, vec![0.0, 1.0]),
                entry(doc, 2, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.1], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].entry.chunk.chunk_index, 0);

        assert!(index.query(&[1.0, 0.0], 0, None).await.unwrap().is_empty());
        assert_eq!(index.query(&[1.0, 0.0], 10, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ties_favor_earlier_insertion() {
        let index = index();
        let doc = Uuid::new_v4();
        let first = entry(doc, 0, vec![1.0, 0.0]);
        let second = entry(doc, 1, vec![2.0, 0.0]);
        let (first_id, second_id) = (first.chunk_id(), second.chunk_id());

        index.upsert(vec![first]).await.unwrap();
        index.upsert(vec![second]).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, first_id);
        assert_eq!(hits[1].chunk_id, second_id);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_swaps_entries() {
        let index = index();
        let doc = Uuid::new_v4();
        index.upsert(vec![entry(doc, 0, vec![1.0, 0.0])]).await.unwrap();

        let before = index.query(&[1.0, 0.0], 1, None).await.unwrap();
        index.upsert(vec![entry(doc, 0, vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        // The earlier snapshot still holds the old vector
        assert_eq!(before[0].entry.embedding, vec![1.0, 0.0]);
        let current = index.get(&before[0].chunk_id).await.unwrap().unwrap();
        assert_eq!(current.embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_rejects_mismatched_entries() {
        let index = index();
        let doc = Uuid::new_v4();

        let err = index.upsert(vec![entry(doc, 0, vec![1.0, 0.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));

        let mut other_model = entry(doc, 1, vec![1.0, 0.0]);
        other_model.model_version = "m2".to_string();
        assert!(index.upsert(vec![entry(doc, 2, vec![1.0, 0.0]), other_model]).await.is_err());
        assert!(index.is_empty().await.unwrap());

        assert!(index.query(&[1.0], 1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_filters() {
        let index = index();
        let (doc_a, doc_b) = (Uuid::new_v4(), Uuid::new_v4());
        index
            .upsert(vec![
                entry(doc_a, 0, vec![1.0, 0.0]),
                entry(doc_a, 1, vec![1.0, 0.2]),
                entry(doc_b, 2, vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let only_b = MetadataFilter::new().with_documents(vec![doc_b]);
        let hits = index.query(&[1.0, 0.0], 10, Some(&only_b)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.document_id(), doc_b);

        let unit_one = MetadataFilter::new().with_metadata("unit", "u1");
        let hits = index.query(&[1.0, 0.0], 10, Some(&unit_one)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.chunk.chunk_index, 1);

        assert_eq!(index.delete_document(&doc_a).await.unwrap(), 2);
        assert_eq!(index.len().await.unwrap(), 1);

        let remaining = hits_ids(&index).await;
        assert_eq!(index.delete(&remaining).await.unwrap(), 1);
        assert_eq!(index.delete(&remaining).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_scores_are_skipped() {
        let index = index();
        let doc = Uuid::new_v4();
        index
            .upsert(vec![
                entry(doc, 0, vec![f32::NAN, 1.0]),
                entry(doc, 1, vec![1.0, 0.0]),
                entry(doc, 2, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.chunk.chunk_index, 1);
        assert!(hits.iter().all(|hit| hit.score.is_finite()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_see_whole_entries() {
        const DIMS: usize = 8;
        const CHUNKS: u32 = 16;

        // Two complete versions per chunk, differing in every other dimension
        fn version(chunk: u32, generation: u32) -> Vec<f32> {
            let base = chunk as f32 + 1.0;
            (0..DIMS)
                .map(|d| if generation % 2 == 1 && d % 2 == 1 { -base } else { base })
                .collect()
        }

        let index = Arc::new(InMemoryVectorIndex::new(IndexConfig {
            dimensions: DIMS,
            metric: DistanceMetric::Cosine,
            model_version: "m1".to_string(),
        }));
        let doc = Uuid::new_v4();

        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                for generation in 0..200u32 {
                    let entries = (0..CHUNKS)
                        .map(|c| entry(doc, c, version(c, generation)))
                        .collect();
                    index.upsert(entries).await.unwrap();
                    if generation % 3 == 0 {
                        index.delete_document(&doc).await.unwrap();
                    } else if generation % 5 == 0 {
                        let some: Vec<Uuid> = hits_ids(&index).await.into_iter().take(4).collect();
                        index.delete(&some).await.unwrap();
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|r| {
                let index = index.clone();
                tokio::spawn(async move {
                    let query: Vec<f32> = (0..DIMS).map(|d| 1.0 + (d + r) as f32 * 0.1).collect();
                    for _ in 0..300 {
                        let hits = index.query(&query, CHUNKS as usize, None).await.unwrap();
                        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
                        for hit in &hits {
                            let chunk = hit.entry.chunk.chunk_index;
                            assert!(
                                hit.entry.embedding == version(chunk, 0)
                                    || hit.entry.embedding == version(chunk, 1)
                            );
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    async fn hits_ids(index: &InMemoryVectorIndex) -> Vec<Uuid> {
        index
            .query(&[1.0, 0.0], 10, None)
            .await
            .unwrap()
            .into_iter()
            .map(|hit| hit.chunk_id)
            .collect()
    }
}
