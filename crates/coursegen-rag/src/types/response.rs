//! Retrieval and generation result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Chunk;
use crate::error::{Error, ErrorKind};

/// A chunk with its similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked passages that fit a token budget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Passages in descending score order
    pub passages: Vec<ScoredChunk>,
    /// Sum of passage token counts
    pub total_tokens: usize,
    /// Candidates returned by the index before dedupe and packing
    pub candidates_considered: usize,
}

impl RetrievalResult {
    /// Result with no passages
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }
}

/// Provenance record for one passage that reached the prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: Uuid,
    /// Nil for caller-supplied context
    pub document_id: Uuid,
    pub source_id: String,
    pub title: Option<String>,
    pub score: f32,
}

impl Citation {
    /// Create a citation from a scored chunk
    pub fn from_scored(scored: &ScoredChunk) -> Self {
        Self {
            chunk_id: scored.chunk.id,
            document_id: scored.chunk.document_id,
            source_id: scored.chunk.source.source_id.clone(),
            title: scored.chunk.source.title.clone(),
            score: scored.score,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match &self.title {
            Some(title) => format!("[{}: {}]", title, self.chunk_id),
            None => format!("[{}: {}]", self.source_id, self.chunk_id),
        }
    }
}

/// Terminal status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Succeeded,
    Failed,
}

/// Validated output of a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Task that produced this result
    pub task_id: String,
    /// Always `Succeeded`; failures are returned as [`Error`]
    pub status: GenerationStatus,
    /// Structured output matching the task schema
    pub output: serde_json::Value,
    /// Model text the output was extracted from
    pub raw_output: String,
    /// Passages actually included in the prompt
    pub provenance: Vec<Citation>,
    /// Repair re-prompts performed (0 or 1)
    pub repair_attempts: u32,
    /// Passages were dropped to fit the prompt budget
    pub truncated: bool,
    /// Token count of the final prompt
    pub prompt_tokens: usize,
    /// Model that generated the output
    pub model: String,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl GenerationResult {
    /// Distinct documents that contributed, in provenance order
    pub fn document_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for citation in &self.provenance {
            if !ids.contains(&citation.document_id) {
                ids.push(citation.document_id);
            }
        }
        ids
    }

    /// Format the provenance as a citation list
    pub fn format_sources(&self) -> String {
        self.provenance
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {} (score {:.3})", i + 1, c.format_inline(), c.score))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Failure details in a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorReport {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Single normalized value for a `submit` outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl From<crate::error::Result<GenerationResult>> for GenerationResponse {
    fn from(outcome: crate::error::Result<GenerationResult>) -> Self {
        match outcome {
            Ok(result) => Self {
                status: GenerationStatus::Succeeded,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                status: GenerationStatus::Failed,
                result: None,
                error: Some(ErrorReport::from(&error)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_envelope() {
        let outcome: crate::error::Result<GenerationResult> =
            Err(Error::request_validation("title", "required field is missing"));
        let response = GenerationResponse::from(outcome);

        assert_eq!(response.status, GenerationStatus::Failed);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "request_validation");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_document_ids_are_distinct() {
        let doc = Uuid::new_v4();
        let citation = |chunk_id| Citation {
            chunk_id,
            document_id: doc,
            source_id: "a.md".to_string(),
            title: None,
            score: 0.5,
        };
        let result = GenerationResult {
            task_id: "quiz_questions".to_string(),
            status: GenerationStatus::Succeeded,
            output: serde_json::json!({}),
            raw_output: "{}".to_string(),
            provenance: vec![citation(Uuid::new_v4()), citation(Uuid::new_v4())],
            repair_attempts: 0,
            truncated: false,
            prompt_tokens: 10,
            model: "test".to_string(),
            processing_time_ms: 1,
        };

        assert_eq!(result.document_ids(), vec![doc]);
        assert!(result.format_sources().starts_with("1. [a.md: "));
    }
}
