//! Ingestion pipeline orchestration
//!
//! normalize -> dedupe -> chunk -> embed -> upsert. Retiring a document
//! cascades to its index entries; purging only the stored document leaves
//! its chunks searchable with degraded provenance.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::embedding::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::index::{IndexEntry, VectorIndex};
use crate::types::{Document, RawDocument};

use super::adapter::{extract_tagged_blocks, normalize, DocumentStore};
use super::chunker::Chunker;

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub source_id: String,
    /// Chunks written to the index (0 when deduplicated)
    pub chunk_count: usize,
    pub token_count: usize,
    /// Identical content already existed; nothing was embedded
    pub deduplicated: bool,
    /// A previous version of the same source was replaced
    pub replaced: bool,
}

/// Main ingestion pipeline
pub struct Ingestor {
    store: Arc<DocumentStore>,
    chunker: Chunker,
    gateway: Arc<EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
}

impl Ingestor {
    /// Create a pipeline; the gateway must produce vectors the index accepts
    pub fn new(
        store: Arc<DocumentStore>,
        chunker: Chunker,
        gateway: Arc<EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let config = index.config();
        if config.model_version != gateway.model_version() {
            return Err(Error::vector_index(format!(
                "index holds '{}' vectors but the gateway embeds with '{}'",
                config.model_version,
                gateway.model_version()
            )));
        }
        if config.dimensions != gateway.dimensions() {
            return Err(Error::vector_index(format!(
                "index expects {} dimensions but the gateway produces {}",
                config.dimensions,
                gateway.dimensions()
            )));
        }

        Ok(Self {
            store,
            chunker,
            gateway,
            index,
        })
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Ingest one raw document
    pub async fn ingest(&self, raw: &RawDocument) -> Result<IngestReport> {
        let document = normalize(raw)?;

        if let Some(existing) = self.store.find_by_hash(&document.content_hash) {
            // This source's older content must not outlive the switch to a duplicate
            let replaced = existing != document.id && self.store.get(&document.id).is_some();
            if replaced {
                self.retire(&document.id).await?;
            }

            tracing::info!(
                "Skipping '{}': identical content already ingested as {}",
                raw.source_id,
                existing
            );
            return Ok(IngestReport {
                document_id: existing,
                source_id: raw.source_id.clone(),
                chunk_count: 0,
                token_count: 0,
                deduplicated: true,
                replaced,
            });
        }

        let chunks = self.chunker.chunk(&document)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batch = self.gateway.embed(&texts).await?;

        let token_count: usize = chunks.iter().map(|c| c.token_count).sum();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(batch.vectors)
            .map(|(chunk, vector)| IndexEntry::new(chunk, vector, batch.model_version.clone()))
            .collect();

        let replaced = self.store.get(&document.id).is_some();
        if replaced {
            let removed = self.index.delete_document(&document.id).await?;
            tracing::info!(
                "Replacing '{}': removed {} outdated chunk(s)",
                document.source_id,
                removed
            );
        }

        let chunk_count = self.index.upsert(entries).await?;
        let report = IngestReport {
            document_id: document.id,
            source_id: document.source_id.clone(),
            chunk_count,
            token_count,
            deduplicated: false,
            replaced,
        };
        self.store.insert(document);

        tracing::info!(
            "Ingested '{}' ({} chunks, {} tokens)",
            report.source_id,
            report.chunk_count,
            report.token_count
        );
        Ok(report)
    }

    /// Ingest several documents concurrently, one outcome per input
    ///
    /// A failing document does not stop the others.
    pub async fn ingest_all(&self, raws: &[RawDocument]) -> Vec<Result<IngestReport>> {
        let outcomes = join_all(raws.iter().map(|raw| self.ingest(raw))).await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            tracing::warn!("{} of {} document(s) failed to ingest", failed, raws.len());
        }
        outcomes
    }

    /// Ingest each `<tag>...</tag>` block of a document as its own document
    ///
    /// Block source ids are `<source_id>#<tag>-<n>`, numbered from 1.
    pub async fn ingest_blocks(&self, raw: &RawDocument, tag: &str) -> Result<Vec<IngestReport>> {
        let blocks = extract_tagged_blocks(&raw.text, tag);
        if blocks.is_empty() {
            return Err(Error::invalid_document(
                &raw.source_id,
                format!("no <{}> blocks found", tag),
            ));
        }

        let mut reports = Vec::with_capacity(blocks.len());
        for (n, block) in blocks.into_iter().enumerate() {
            let mut part = raw.clone();
            part.source_id = format!("{}#{}-{}", raw.source_id, tag, n + 1);
            part.text = block;
            part.metadata
                .insert("parent_source_id".to_string(), raw.source_id.clone());
            reports.push(self.ingest(&part).await?);
        }
        Ok(reports)
    }

    /// Remove a document and all of its index entries
    pub async fn retire(&self, document_id: &Uuid) -> Result<usize> {
        let removed = self.index.delete_document(document_id).await?;
        let purged = self.store.purge(document_id).is_some();

        tracing::info!(
            "Retired document {} ({} chunks removed, stored copy {})",
            document_id,
            removed,
            if purged { "purged" } else { "absent" }
        );
        Ok(removed)
    }

    /// Drop only the stored document; its chunks stay searchable
    pub fn purge(&self, document_id: &Uuid) -> Option<Document> {
        self.store.purge(document_id)
    }
}
