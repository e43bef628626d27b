//! Embedding gateway and its shared cache

pub mod cache;
pub mod gateway;

pub use cache::{CacheStats, EmbeddingCache};
pub use gateway::{EmbeddingBatch, EmbeddingGateway};
