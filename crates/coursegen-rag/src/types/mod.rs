//! Core types for the RAG system

pub mod document;
pub mod request;
pub mod response;

pub use document::{Chunk, ChunkSource, Document, RawDocument, SourceFormat};
pub use request::GenerationRequest;
pub use response::{
    Citation, ErrorReport, GenerationResponse, GenerationResult, GenerationStatus,
    RetrievalResult, ScoredChunk,
};
