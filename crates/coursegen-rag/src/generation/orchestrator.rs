//! Per-request generation pipeline
//!
//! Validating -> Retrieving -> Assembling -> Generating -> ValidatingOutput,
//! ending in Succeeded or Failed. Stages are logged, never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use super::gateway::ModelGateway;
use super::output::parse_output;
use crate::error::{Error, Result};
use crate::prompt::{Prompt, PromptAssembler};
use crate::providers::ModelRequest;
use crate::retrieval::Retriever;
use crate::tasks::{TaskRegistry, TaskTemplate};
use crate::types::{
    Chunk, Citation, GenerationRequest, GenerationResult, GenerationStatus, ScoredChunk,
};

/// Stage of a generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Validating,
    Retrieving,
    Assembling,
    Generating,
    ValidatingOutput,
    Succeeded,
    Failed,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::ValidatingOutput => "validating_output",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage of one request for logging
struct StageLog<'a> {
    request_id: Uuid,
    task_id: &'a str,
    stage: GenerationStage,
}

impl<'a> StageLog<'a> {
    fn start(task_id: &'a str) -> Self {
        let log = Self {
            request_id: Uuid::new_v4(),
            task_id,
            stage: GenerationStage::Validating,
        };
        tracing::debug!("[{}] {}: {}", log.request_id, task_id, log.stage);
        log
    }

    fn enter(&mut self, stage: GenerationStage) {
        tracing::debug!(
            "[{}] {}: {} -> {}",
            self.request_id,
            self.task_id,
            self.stage,
            stage
        );
        self.stage = stage;
    }
}

/// Runs generation requests end to end
pub struct GenerationOrchestrator {
    registry: TaskRegistry,
    retriever: Retriever,
    assembler: PromptAssembler,
    model: ModelGateway,
    default_temperature: Option<f32>,
}

impl GenerationOrchestrator {
    pub fn new(
        registry: TaskRegistry,
        retriever: Retriever,
        assembler: PromptAssembler,
        model: ModelGateway,
    ) -> Self {
        Self {
            registry,
            retriever,
            assembler,
            model,
            default_temperature: None,
        }
    }

    /// Temperature for tasks that do not set one
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run one request to completion
    pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let started = Instant::now();
        let mut stages = StageLog::start(&request.task_id);

        match self.run(&request, &mut stages, started).await {
            Ok(result) => {
                stages.enter(GenerationStage::Succeeded);
                tracing::info!(
                    "Generated '{}' in {}ms ({} source passage(s), {} repair attempt(s))",
                    result.task_id,
                    result.processing_time_ms,
                    result.provenance.len(),
                    result.repair_attempts
                );
                if !result.provenance.is_empty() {
                    tracing::debug!("Sources for '{}':\n{}", result.task_id, result.format_sources());
                }
                Ok(result)
            }
            Err(err) => {
                let failed_at = stages.stage;
                stages.enter(GenerationStage::Failed);
                tracing::warn!(
                    "Generation of '{}' failed while {}: {}",
                    request.task_id,
                    failed_at,
                    err
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        stages: &mut StageLog<'_>,
        started: Instant,
    ) -> Result<GenerationResult> {
        let task = self.registry.get(&request.task_id).ok_or_else(|| {
            Error::request_validation(
                "task_id",
                format!("unknown task '{}'", request.task_id),
            )
        })?;
        task.validate_request(request)?;

        stages.enter(GenerationStage::Retrieving);
        let passages = self.gather_context(task, request).await?;

        stages.enter(GenerationStage::Assembling);
        let fields = task.resolve_fields(request);
        let prompt = self.assembler.assemble(task, &passages, &fields)?;

        stages.enter(GenerationStage::Generating);
        let raw = self.model.generate(&self.model_request(task, &prompt)).await?;

        stages.enter(GenerationStage::ValidatingOutput);
        let (output, raw_output, prompt, repair_attempts) = match self.check_output(task, &raw) {
            Ok(output) => (output, raw, prompt, 0),
            Err(message) => {
                tracing::info!(
                    "Output for '{}' failed validation ({}), re-prompting once",
                    task.id,
                    message
                );
                stages.enter(GenerationStage::Assembling);
                let appendix = format!(
                    "Your previous response could not be used: {}. Respond again with \
                     only the JSON object, following the required structure exactly.",
                    message
                );
                let repair = self.assembler.assemble_with_appendix(
                    task,
                    &passages,
                    &fields,
                    Some(&appendix),
                )?;

                stages.enter(GenerationStage::Generating);
                let raw = self.model.generate(&self.model_request(task, &repair)).await?;

                stages.enter(GenerationStage::ValidatingOutput);
                let output = self.check_output(task, &raw).map_err(|message| Error::OutputSchema {
                    task: task.id.clone(),
                    message,
                    repair_attempts: 1,
                })?;
                (output, raw, repair, 1)
            }
        };

        Ok(GenerationResult {
            task_id: task.id.clone(),
            status: GenerationStatus::Succeeded,
            output,
            raw_output,
            provenance: prompt.passages.iter().map(Citation::from_scored).collect(),
            repair_attempts,
            truncated: prompt.truncated,
            prompt_tokens: prompt.token_count,
            model: self.model.model().to_string(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Caller-supplied passages, or a retrieval for the task query
    async fn gather_context(
        &self,
        task: &TaskTemplate,
        request: &GenerationRequest,
    ) -> Result<Vec<ScoredChunk>> {
        if let Some(texts) = &request.context_override {
            let counter = self.assembler.counter();
            let passages: Vec<ScoredChunk> = texts
                .iter()
                .filter(|text| !text.trim().is_empty())
                .enumerate()
                .map(|(i, text)| ScoredChunk {
                    chunk: Chunk::transient(i as u32, text.clone(), counter.count(text)),
                    score: 1.0,
                })
                .collect();
            tracing::debug!("Using {} caller-supplied passage(s)", passages.len());
            return Ok(passages);
        }

        let query = task.query_text(request);
        let result = self
            .retriever
            .retrieve_default(&query, request.filter.as_ref())
            .await?;
        if result.is_empty() {
            tracing::info!("No passages retrieved for '{}', generating without context", task.id);
        }
        Ok(result.passages)
    }

    fn model_request(&self, task: &TaskTemplate, prompt: &Prompt) -> ModelRequest {
        let mut params = task.params.clone();
        if params.temperature.is_none() {
            params.temperature = self.default_temperature;
        }

        let structured = !task.output_schema.fields.is_empty();
        ModelRequest {
            system: prompt.system.clone(),
            prompt: prompt.user.clone(),
            schema: structured.then(|| task.output_schema.to_json_schema()),
            params,
        }
    }

    /// Tasks without an output schema accept the raw text as-is
    fn check_output(&self, task: &TaskTemplate, raw: &str) -> std::result::Result<Value, String> {
        if task.output_schema.fields.is_empty() {
            let text = raw.trim();
            if text.is_empty() {
                return Err("model returned no text".to_string());
            }
            return Ok(Value::String(text.to_string()));
        }
        parse_output(raw, &task.output_schema)
    }
}
