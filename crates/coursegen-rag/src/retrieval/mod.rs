//! Retrieval: query embedding, ranking and token-budget packing

mod retriever;

pub use retriever::Retriever;
