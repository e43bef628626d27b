//! Document and chunk types with source tracking for provenance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Namespace for deterministic document and chunk ids
pub const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c0f_4a8e_2b1d_4e57_9a3c_5d7e_8f10_2b44);

/// How the raw text is formatted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Plain text
    #[default]
    Text,
    /// Markdown (kept as-is)
    Markdown,
    /// HTML (tags are stripped)
    Html,
}

/// Raw input from the document-store collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Caller-side identifier (path, URL, storage key)
    pub source_id: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Body text
    pub text: String,
    /// Body format
    #[serde(default)]
    pub format: SourceFormat,
    /// String-keyed metadata, copied onto every chunk
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RawDocument {
    /// Plain-text document with no metadata
    pub fn text(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: None,
            text: text.into(),
            format: SourceFormat::Text,
            metadata: HashMap::new(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the format
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a metadata pair
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A normalized document ready for chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document ID, derived from the source id
    pub id: Uuid,
    /// Caller-side identifier
    pub source_id: String,
    /// Display title
    pub title: Option<String>,
    /// Normalized body text
    pub text: String,
    /// SHA-256 of the normalized text, for deduplication
    pub content_hash: String,
    /// Ingestion timestamp
    pub ingested_at: DateTime<Utc>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Deterministic document id for a source id
    pub fn id_for_source(source_id: &str) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, source_id.as_bytes())
    }
}

/// Source information for a chunk (used for citations)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkSource {
    /// Caller-side identifier of the parent document
    pub source_id: String,
    /// Parent document title
    pub title: Option<String>,
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable chunk ID
    pub id: Uuid,
    /// Parent document ID; a weak reference, the document may be purged
    pub document_id: Uuid,
    /// Chunk index within document
    pub chunk_index: u32,
    /// Text content, an exact slice of the document text
    pub content: String,
    /// Byte offsets in the normalized document text
    pub char_start: usize,
    pub char_end: usize,
    /// Token count of `content`
    pub token_count: usize,
    /// Source information for citations
    pub source: ChunkSource,
    /// Metadata inherited from the document
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Stable chunk id from parent, position and content
    pub fn stable_id(document_id: &Uuid, chunk_index: u32, content_hash: &str) -> Uuid {
        let name = format!("{}:{}:{}", document_id, chunk_index, content_hash);
        Uuid::new_v5(&ID_NAMESPACE, name.as_bytes())
    }

    /// Transient chunk for caller-supplied context (no parent document)
    pub fn transient(index: u32, content: String, token_count: usize) -> Self {
        let id = Uuid::new_v5(&ID_NAMESPACE, content.as_bytes());
        Self {
            id,
            document_id: Uuid::nil(),
            chunk_index: index,
            char_start: 0,
            char_end: content.len(),
            content,
            token_count,
            source: ChunkSource {
                source_id: "context-override".to_string(),
                title: None,
            },
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_deterministic() {
        let a = Document::id_for_source("notes/biology.md");
        let b = Document::id_for_source("notes/biology.md");
        assert_eq!(a, b);
        assert_ne!(a, Document::id_for_source("notes/physics.md"));

        assert_eq!(Chunk::stable_id(&a, 0, "h"), Chunk::stable_id(&a, 0, "h"));
        assert_ne!(Chunk::stable_id(&a, 0, "h"), Chunk::stable_id(&a, 1, "h"));
    }
}
