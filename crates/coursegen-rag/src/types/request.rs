//! Generation request types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index::MetadataFilter;

/// A normalized request from one of the content tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Task template id (e.g. `quiz_questions`)
    pub task_id: String,

    /// Input fields keyed by placeholder name
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,

    /// Explicit retrieval query; defaults to the task's query fields
    #[serde(default)]
    pub query: Option<String>,

    /// Caller-supplied passages that replace retrieval entirely
    #[serde(default)]
    pub context_override: Option<Vec<String>>,

    /// Restrict retrieval to matching chunks
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

impl GenerationRequest {
    /// Create a request for a task
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            fields: BTreeMap::new(),
            query: None,
            context_override: None,
            filter: None,
        }
    }

    /// Set an input field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the retrieval query
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Supply context directly, bypassing retrieval
    pub fn with_context_override(mut self, passages: Vec<String>) -> Self {
        self.context_override = Some(passages);
        self
    }

    /// Restrict retrieval
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Render a JSON value for substitution into a prompt
pub fn value_as_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_as_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
