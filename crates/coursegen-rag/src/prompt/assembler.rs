//! Prompt assembly under the context window budget

use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::template;
use crate::config::PromptConfig;
use crate::error::{Error, Result};
use crate::tasks::{TaskTemplate, CONTEXT_PLACEHOLDER};
use crate::tokens::TokenCounter;
use crate::types::ScoredChunk;

const NO_CONTEXT: &str = "No reference material is available for this request.";

/// A fully rendered prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Tokens in `system` and `user` together
    pub token_count: usize,
    /// Passages that made it into `user`, best first
    pub passages: Vec<ScoredChunk>,
    /// Passages were dropped to fit the budget
    pub truncated: bool,
}

impl Prompt {
    /// Ids of the included chunks
    pub fn chunk_ids(&self) -> Vec<Uuid> {
        self.passages.iter().map(|p| p.chunk.id).collect()
    }
}

/// Builds prompts from a task template, fields and passages
pub struct PromptAssembler {
    counter: Arc<dyn TokenCounter>,
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(counter: Arc<dyn TokenCounter>, config: PromptConfig) -> Self {
        Self { counter, config }
    }

    /// Tokens the prompt may use
    pub fn budget(&self) -> usize {
        self.config.prompt_budget()
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Render `task` with `fields` and as many passages as fit
    ///
    /// Passages are dropped from the lowest-scored end until the prompt fits.
    pub fn assemble(
        &self,
        task: &TaskTemplate,
        passages: &[ScoredChunk],
        fields: &BTreeMap<String, String>,
    ) -> Result<Prompt> {
        self.assemble_with_appendix(task, passages, fields, None)
    }

    /// As [`assemble`](Self::assemble), closing the user prompt with
    /// `appendix`, which counts against the same budget
    pub fn assemble_with_appendix(
        &self,
        task: &TaskTemplate,
        passages: &[ScoredChunk],
        fields: &BTreeMap<String, String>,
        appendix: Option<&str>,
    ) -> Result<Prompt> {
        let mut ranked = passages.to_vec();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let system = self.render_system(task, fields)?;
        let system_tokens = self.counter.count(&system);
        let budget = self.budget();

        let mut kept = ranked.len();
        loop {
            let mut user = self.render_user(task, &ranked[..kept], fields)?;
            if let Some(appendix) = appendix {
                user.push_str("\n\n");
                user.push_str(appendix);
            }
            let token_count = system_tokens + self.counter.count(&user);

            if token_count <= budget {
                let truncated = kept < ranked.len();
                if truncated {
                    tracing::info!(
                        "Prompt for '{}' truncated to {} of {} passage(s) ({} tokens, budget {})",
                        task.id,
                        kept,
                        ranked.len(),
                        token_count,
                        budget
                    );
                }
                ranked.truncate(kept);
                return Ok(Prompt {
                    system,
                    user,
                    token_count,
                    passages: ranked,
                    truncated,
                });
            }

            if kept == 0 {
                return Err(Error::Template {
                    template: task.id.clone(),
                    message: format!(
                        "prompt needs {} tokens without any passages, budget is {}",
                        token_count, budget
                    ),
                    prompt_tokens: Some(token_count),
                });
            }
            kept -= 1;
        }
    }

    fn render_system(&self, task: &TaskTemplate, fields: &BTreeMap<String, String>) -> Result<String> {
        let mut system = template::render(&task.id, &task.system_prompt, fields)?;

        if !task.output_schema.fields.is_empty() {
            let example = serde_json::to_string_pretty(&task.output_schema.example())?;
            system.push_str(
                "\n\nRespond with a single JSON object and nothing else. Use this structure:\n",
            );
            system.push_str(&example);
        }
        Ok(system)
    }

    fn render_user(
        &self,
        task: &TaskTemplate,
        passages: &[ScoredChunk],
        fields: &BTreeMap<String, String>,
    ) -> Result<String> {
        let context = format_context(passages);

        let mut values = fields.clone();
        values.insert(CONTEXT_PLACEHOLDER.to_string(), context.clone());

        let mut user = template::render(&task.id, &task.user_template, &values)?;
        if !template::placeholders(&task.id, &task.user_template)?
            .iter()
            .any(|p| p == CONTEXT_PLACEHOLDER)
        {
            user.push_str("\n\nReference material:\n");
            user.push_str(&context);
        }

        for fragment in task.fragments.iter().filter(|f| f.applies(fields)) {
            user.push_str("\n\n");
            user.push_str(&template::render(&task.id, &fragment.text, &values)?);
        }

        Ok(user)
    }
}

fn format_context(passages: &[ScoredChunk]) -> String {
    if passages.is_empty() {
        return NO_CONTEXT.to_string();
    }

    passages
        .iter()
        .map(|p| {
            let heading = match &p.chunk.source.title {
                Some(title) => format!("[source:{}] {}", p.chunk.id, title),
                None => format!("[source:{}]", p.chunk.id),
            };
            format!("{}\n{}", heading, p.chunk.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{FieldKind, FieldSpec, OutputSchema};
    use crate::tokens::UnicodeTokenCounter;
    use crate::types::Chunk;

    fn task(user_template: &str) -> TaskTemplate {
        TaskTemplate {
            id: "summary".to_string(),
            description: String::new(),
            system_prompt: "You summarise course material.".to_string(),
            user_template: user_template.to_string(),
            fields: vec![FieldSpec {
                name: "topic".to_string(),
                kind: FieldKind::Text,
                required: true,
                default: None,
                description: None,
            }],
            fragments: Vec::new(),
            query_fields: vec!["topic".to_string()],
            output_schema: OutputSchema::default(),
            params: Default::default(),
        }
    }

    fn passage(index: u32, words: usize, score: f32) -> ScoredChunk {
        let content = vec!["word"; words].join(" ");
        ScoredChunk {
            chunk: Chunk::transient(index, format!("{} {}", index, content), words + 1),
            score,
        }
    }

    fn fields() -> BTreeMap<String, String> {
        BTreeMap::from([("topic".to_string(), "rivers".to_string())])
    }

    fn assembler(context_limit: usize, completion_reserve: usize) -> PromptAssembler {
        PromptAssembler::new(
            Arc::new(UnicodeTokenCounter),
            PromptConfig {
                context_limit,
                completion_reserve,
            },
        )
    }

    #[test]
    fn test_passages_are_tagged_with_chunk_ids() {
        let passages = vec![passage(0, 3, 0.9), passage(1, 3, 0.8)];
        let prompt = assembler(8192, 2048)
            .assemble(&task("Summarise {topic}.\n{context}"), &passages, &fields())
            .unwrap();

        assert!(prompt.user.starts_with("Summarise rivers."));
        for p in &passages {
            assert!(prompt.user.contains(&format!("[source:{}]", p.chunk.id)));
        }
        assert!(!prompt.truncated);
        assert_eq!(prompt.chunk_ids().len(), 2);
    }

    #[test]
    fn test_context_appended_when_template_omits_it() {
        let passages = vec![passage(0, 3, 0.9)];
        let prompt = assembler(8192, 2048)
            .assemble(&task("Summarise {topic}."), &passages, &fields())
            .unwrap();
        assert!(prompt.user.contains("Reference material:"));
        assert!(prompt.user.contains(&passages[0].chunk.content));
    }

    #[test]
    fn test_empty_context_placeholder() {
        let prompt = assembler(8192, 2048)
            .assemble(&task("Summarise {topic}.\n{context}"), &[], &fields())
            .unwrap();
        assert!(prompt.user.contains(NO_CONTEXT));
        assert!(prompt.passages.is_empty());
    }

    #[test]
    fn test_truncation_drops_lowest_scored_first() {
        let t = task("Summarise {topic}.\n{context}");
        let passages = vec![passage(0, 40, 0.5), passage(1, 40, 0.9), passage(2, 40, 0.7)];

        let full = assembler(100_000, 0).assemble(&t, &passages, &fields()).unwrap();
        // Room for the two best passages but not the third
        let limit = full.token_count - 20;
        let prompt = assembler(limit, 0).assemble(&t, &passages, &fields()).unwrap();

        assert!(prompt.truncated);
        assert!(prompt.token_count <= limit);
        assert_eq!(prompt.passages.len(), 2);
        assert_eq!(prompt.passages[0].score, 0.9);
        assert_eq!(prompt.passages[1].score, 0.7);
    }

    #[test]
    fn test_appendix_counts_against_budget() {
        let t = task("Summarise {topic}.\n{context}");
        let passages = vec![passage(0, 40, 0.5), passage(1, 40, 0.9), passage(2, 40, 0.7)];

        let full = assembler(100_000, 0).assemble(&t, &passages, &fields()).unwrap();
        let limit = full.token_count + 5;
        let plain = assembler(limit, 0).assemble(&t, &passages, &fields()).unwrap();
        assert!(!plain.truncated);

        let appendix = vec!["again"; 30].join(" ");
        let repaired = assembler(limit, 0)
            .assemble_with_appendix(&t, &passages, &fields(), Some(&appendix))
            .unwrap();

        assert!(repaired.user.ends_with(&appendix));
        assert!(repaired.truncated);
        assert!(repaired.token_count <= limit);
        assert_eq!(repaired.passages.len(), 2);
        assert_eq!(repaired.passages[1].score, 0.7);
    }

    #[test]
    fn test_template_too_large_without_passages() {
        let err = assembler(10, 5)
            .assemble(&task("Summarise {topic} in great detail please.\n{context}"), &[passage(0, 3, 0.9)], &fields())
            .unwrap_err();
        match err {
            Error::Template { prompt_tokens, .. } => assert!(prompt_tokens.unwrap() > 5),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_template_error() {
        let err = assembler(8192, 2048)
            .assemble(&task("Summarise {topic}."), &[], &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }
}
