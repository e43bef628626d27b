//! Document ingestion: normalization, chunking and indexing

pub mod adapter;
mod chunker;
mod pipeline;

pub use adapter::{content_hash, extract_tagged_blocks, normalize, DocumentStore};
pub use chunker::Chunker;
pub use pipeline::{IngestReport, Ingestor};
