//! Sentence-aware text chunking with token overlap
//!
//! Chunks are exact slices of the normalized document text. Cut points fall
//! on Unicode sentence boundaries whenever one is available inside the token
//! window; a hard cut at the window edge is used only when a sentence is
//! longer than the window itself.

use sha2::{Digest, Sha256};
use std::ops::Range;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::tokens::{TokenCounter, UnicodeTokenCounter};
use crate::types::{Chunk, ChunkSource, Document};

/// Text chunker with configurable size and overlap, both in tokens
pub struct Chunker {
    /// Maximum tokens per chunk
    max_tokens: usize,
    /// Tokens shared by consecutive chunks
    overlap_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

impl Chunker {
    /// Create a chunker using the default token counter
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        Self::with_counter(max_tokens, overlap_tokens, Arc::new(UnicodeTokenCounter))
    }

    /// Create a chunker with a custom token counter
    pub fn with_counter(
        max_tokens: usize,
        overlap_tokens: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self> {
        if max_tokens == 0 {
            return Err(Error::config("chunk max_tokens must be > 0"));
        }
        if overlap_tokens >= max_tokens {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than max_tokens ({})",
                overlap_tokens, max_tokens
            )));
        }

        Ok(Self {
            max_tokens,
            overlap_tokens,
            counter,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        Self::with_counter(config.max_tokens, config.overlap_tokens, counter)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Split a document into chunks
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = document.text.as_str();
        if text.contains('\0') {
            return Err(Error::invalid_document(
                &document.source_id,
                "document contains binary data",
            ));
        }

        let tokens = self.counter.token_spans(text);
        if tokens.is_empty() {
            return Err(Error::invalid_document(&document.source_id, "document is empty"));
        }

        let boundaries = sentence_boundaries(text, &tokens);
        let windows = self.plan_windows(tokens.len(), &boundaries);

        let source = ChunkSource {
            source_id: document.source_id.clone(),
            title: document.title.clone(),
        };

        let chunks: Vec<Chunk> = windows
            .into_iter()
            .enumerate()
            .map(|(index, window)| {
                let char_start = tokens[window.start].start;
                let char_end = tokens[window.end - 1].end;
                let content = text[char_start..char_end].to_string();
                let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
                let chunk_index = index as u32;

                Chunk {
                    id: Chunk::stable_id(&document.id, chunk_index, &content_hash),
                    document_id: document.id,
                    chunk_index,
                    content,
                    char_start,
                    char_end,
                    token_count: window.len(),
                    source: source.clone(),
                    metadata: document.metadata.clone(),
                }
            })
            .collect();

        tracing::debug!(
            "Chunked '{}' into {} chunk(s) ({} tokens)",
            document.source_id,
            chunks.len(),
            tokens.len()
        );

        Ok(chunks)
    }

    /// Token windows covering `0..n`
    ///
    /// `boundaries` holds sorted token indices where a sentence starts.
    fn plan_windows(&self, n: usize, boundaries: &[usize]) -> Vec<Range<usize>> {
        let mut windows = Vec::new();
        let mut start = 0usize;
        let mut covered = 0usize;

        loop {
            let limit = (start + self.max_tokens).min(n);

            let end = if limit == n {
                n
            } else {
                // A cut must add new text and leave room for the overlap
                let floor = covered.max(start + self.overlap_tokens);
                last_boundary_in(boundaries, floor, limit).unwrap_or(limit)
            };

            windows.push(start..end);
            if end == n {
                break;
            }

            // Restart on a sentence when one is close enough behind the cut
            let overlap_floor = end - self.overlap_tokens;
            let lower = start.max(end.saturating_sub(self.max_tokens / 2));
            start = last_boundary_in(boundaries, lower, overlap_floor).unwrap_or(overlap_floor);
            covered = end;
        }

        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            max_tokens: config.max_tokens,
            overlap_tokens: config.overlap_tokens,
            counter: Arc::new(UnicodeTokenCounter),
        }
    }
}

/// Token indices (excluding 0) at which a sentence begins
fn sentence_boundaries(text: &str, tokens: &[Range<usize>]) -> Vec<usize> {
    let mut boundaries = Vec::new();

    for (offset, _) in text.split_sentence_bound_indices() {
        let index = tokens.partition_point(|span| span.start < offset);
        if index > 0 && index < tokens.len() && boundaries.last() != Some(&index) {
            boundaries.push(index);
        }
    }

    boundaries
}

/// Largest boundary `b` with `lower < b <= upper`
fn last_boundary_in(boundaries: &[usize], lower: usize, upper: usize) -> Option<usize> {
    let end = boundaries.partition_point(|&b| b <= upper);
    boundaries[..end].last().copied().filter(|&b| b > lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn document(text: &str) -> Document {
        Document {
            id: Document::id_for_source("test.txt"),
            source_id: "test.txt".to_string(),
            title: Some("Test".to_string()),
            text: text.to_string(),
            content_hash: String::new(),
            ingested_at: Utc::now(),
            metadata: HashMap::from([("course".to_string(), "bio".to_string())]),
        }
    }

    fn reconstruct(chunks: &[Chunk], text: &str) -> String {
        let mut out = chunks[0].content.clone();
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            out.push_str(&text[prev.char_end..next.char_end]);
        }
        out
    }

    fn sample_text() -> String {
        (0..40)
            .map(|i| format!("Sentence number {} talks about cell biology and energy.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(10, 10).is_err());
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn test_empty_document_is_invalid() {
        let chunker = Chunker::new(50, 5).unwrap();
        let err = chunker.chunk(&document("  \n\n ")).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));

        let err = chunker.chunk(&document("abc\0def")).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunker = Chunker::new(50, 5).unwrap();
        let doc = document("Photosynthesis converts light into chemical energy.");
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, doc.text);
        // "Photosynthesis" is longer than one token piece
        assert_eq!(chunks[0].token_count, 8);
        assert_eq!(chunks[0].metadata.get("course").map(String::as_str), Some("bio"));
    }

    #[test]
    fn test_size_overlap_and_reconstruction() {
        let counter = UnicodeTokenCounter;
        let text = sample_text();
        let chunker = Chunker::new(40, 8).unwrap();
        let chunks = chunker.chunk(&document(&text)).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 40);
            assert_eq!(chunk.content, &text[chunk.char_start..chunk.char_end]);
        }
        for pair in chunks.windows(2) {
            let shared = &text[pair[1].char_start..pair[0].char_end];
            assert!(counter.count(shared) >= 8, "overlap too small: {:?}", shared);
        }
        assert_eq!(reconstruct(&chunks, &text), text.trim());
    }

    #[test]
    fn test_cuts_on_sentence_boundaries() {
        let text = sample_text();
        let chunker = Chunker::new(40, 8).unwrap();
        let chunks = chunker.chunk(&document(&text)).unwrap();

        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.content.ends_with('.'), "cut mid-sentence: {:?}", chunk.content);
            assert!(chunk.content.starts_with("Sentence"));
        }
    }

    #[test]
    fn test_long_sentence_falls_back_to_hard_cuts() {
        let counter = UnicodeTokenCounter;
        let text = format!("Short intro. {}", "word ".repeat(200).trim_end());
        let chunker = Chunker::new(30, 5).unwrap();
        let chunks = chunker.chunk(&document(&text)).unwrap();

        assert!(chunks.len() > 5);
        for chunk in &chunks {
            assert!(chunk.token_count <= 30);
        }
        for pair in chunks.windows(2) {
            let shared = &text[pair[1].char_start..pair[0].char_end];
            assert!(counter.count(shared) >= 5);
        }
        assert_eq!(reconstruct(&chunks, &text), text);
    }

    #[test]
    fn test_chunk_ids_are_stable() {
        let text = sample_text();
        let chunker = Chunker::new(40, 8).unwrap();
        let first = chunker.chunk(&document(&text)).unwrap();
        let second = chunker.chunk(&document(&text)).unwrap();

        let ids: Vec<_> = first.iter().map(|c| c.id).collect();
        assert_eq!(ids, second.iter().map(|c| c.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_overlap_tiles_the_text() {
        let text = sample_text();
        let chunker = Chunker::new(25, 0).unwrap();
        let chunks = chunker.chunk(&document(&text)).unwrap();

        for pair in chunks.windows(2) {
            assert!(pair[1].char_start > pair[0].char_start);
        }
        assert_eq!(reconstruct(&chunks, &text), text);
    }
}
