//! Command-line front end for the generation core
//!
//! The index lives in memory, so `generate` ingests its source documents and
//! runs the request in one process.
//!
//! ```bash
//! coursegen --config coursegen.toml generate --task quiz_questions \
//!     --doc notes/photosynthesis.md --field title="Photosynthesis" --field questions_num=3
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use coursegen_rag::{
    config::RagConfig,
    providers::OllamaClient,
    types::{GenerationRequest, RawDocument, SourceFormat},
    CourseGen,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coursegen", version, about = "Grounded instructional content generation")]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tasks
    Tasks,

    /// Check that the Ollama server is reachable
    Check,

    /// Ingest documents and run one generation request
    Generate {
        /// Task id, e.g. `quiz_questions`
        #[arg(long)]
        task: String,

        /// Source documents to ground the output in
        #[arg(long = "doc")]
        docs: Vec<PathBuf>,

        /// Split each document into `<tag>...</tag>` blocks before ingesting
        #[arg(long)]
        blocks: Option<String>,

        /// Input field as `name=value`; JSON values are parsed, anything else is text
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, serde_json::Value)>,

        /// Explicit retrieval query
        #[arg(long)]
        query: Option<String>,

        /// Files used verbatim as context instead of retrieval
        #[arg(long = "context")]
        context: Vec<PathBuf>,
    },
}

fn parse_field(arg: &str) -> Result<(String, serde_json::Value), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

fn read_document(path: &Path) -> anyhow::Result<RawDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => SourceFormat::Markdown,
        Some("html") | Some("htm") => SourceFormat::Html,
        _ => SourceFormat::Text,
    };
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .replace(['_', '-'], " ");

    Ok(RawDocument::text(path.display().to_string(), text)
        .with_title(title)
        .with_format(format))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursegen_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RagConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RagConfig::default(),
    };

    match cli.command {
        Commands::Tasks => {
            let core = CourseGen::from_config(config)?;
            for task in core.tasks() {
                println!("{}", task);
            }
        }
        Commands::Check => {
            let client = OllamaClient::new(&config.llm, &config.embeddings)?;
            if client.health_check().await {
                println!("Ollama is reachable at {}", config.llm.base_url);
            } else {
                bail!(
                    "Ollama is not reachable at {}; start it with `ollama serve` and pull '{}' and '{}'",
                    config.llm.base_url,
                    config.embeddings.model,
                    config.llm.generate_model
                );
            }
        }
        Commands::Generate {
            task,
            docs,
            blocks,
            fields,
            query,
            context,
        } => {
            let core = CourseGen::from_config(config)?;

            let raws = docs
                .iter()
                .map(|path| read_document(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            match &blocks {
                Some(tag) => {
                    for raw in &raws {
                        let reports = core.ingest_blocks(raw, tag).await?;
                        tracing::info!("{}: {} block(s) ingested", raw.source_id, reports.len());
                    }
                }
                None => {
                    for outcome in core.ingest_all(&raws).await {
                        outcome?;
                    }
                }
            }

            let mut request = GenerationRequest::new(task);
            for (name, value) in fields {
                request = request.with_field(name, value);
            }
            if let Some(query) = query {
                request = request.with_query(query);
            }
            if !context.is_empty() {
                let passages = context
                    .iter()
                    .map(|path| {
                        std::fs::read_to_string(path)
                            .with_context(|| format!("Failed to read {}", path.display()))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                request = request.with_context_override(passages);
            }

            let response = core.respond(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.error.is_some() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
