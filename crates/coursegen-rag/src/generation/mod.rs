//! Schema-checked generation: model gateway, output parsing and the
//! per-request orchestrator

mod gateway;
mod orchestrator;
pub mod output;

pub use gateway::ModelGateway;
pub use orchestrator::{GenerationOrchestrator, GenerationStage};
pub use output::{extract_json, parse_output};
