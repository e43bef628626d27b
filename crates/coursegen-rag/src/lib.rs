//! coursegen-rag: retrieval-augmented generation core for instructional content
//!
//! Source documents are normalized, chunked, embedded and indexed. Each
//! generation request retrieves the passages most relevant to its task,
//! assembles a prompt that fits the model's context window, and validates
//! the model's JSON output against the task schema, keeping track of which
//! chunks the result was grounded in.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod prompt;
pub mod providers;
pub mod retrieval;
pub mod retry;
pub mod tasks;
pub mod tokens;
pub mod types;

pub use config::RagConfig;
pub use engine::CourseGen;
pub use error::{Error, ErrorKind, Result};
pub use generation::{GenerationOrchestrator, GenerationStage};
pub use tasks::{TaskRegistry, TaskTemplate};
pub use types::{
    document::{Chunk, ChunkSource, Document, RawDocument, SourceFormat},
    request::GenerationRequest,
    response::{Citation, GenerationResponse, GenerationResult, RetrievalResult},
};
