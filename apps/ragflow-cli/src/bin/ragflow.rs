use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ragflow_core::document::collect_inputs;
use ragflow_core::{Embedder, Settings};
use ragflow_embed::embedder_from_settings;
use ragflow_generate::ChatCompletionsGenerator;
use ragflow_pipeline::Orchestrator;
use ragflow_vector::open_store;

/// Index local documents and answer questions over them with a local LLM.
#[derive(Parser, Debug)]
#[command(name = "ragflow", version, about, long_about = None)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index files or directories (.txt and .md)
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ask a question against the indexed documents
    Query {
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Generation temperature
        #[arg(long)]
        temperature: Option<f32>,
        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Print the retrieved chunks after the answer
        #[arg(long)]
        show_sources: bool,
    },
    /// Show index statistics
    Stats,
    /// Remove every indexed chunk
    Reset,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn spinner(msg: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

struct App {
    orchestrator: Orchestrator,
    embedder: Arc<dyn Embedder>,
    generator: Arc<ChatCompletionsGenerator>,
    settings: Settings,
}

async fn build(settings: Settings) -> anyhow::Result<App> {
    let embedder = embedder_from_settings(&settings.embedding)?;
    let store = open_store(&settings.store).await?;
    let generator = Arc::new(
        ChatCompletionsGenerator::from_settings(&settings.generation).context("building the generation client")?,
    );
    let orchestrator = Orchestrator::new(settings.pipeline, Arc::clone(&embedder), store, generator.clone())?;
    tracing::debug!(model = embedder.model_id(), store = %settings.store.location, "pipeline ready");
    Ok(App { orchestrator, embedder, generator, settings })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load_from(&cli.config_dir)?;

    match cli.command {
        Command::Index { paths, chunk_size, chunk_overlap } => {
            if let Some(size) = chunk_size {
                settings.pipeline.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                settings.pipeline.chunk_overlap = overlap;
            }
            let app = build(settings).await?;
            let inputs = collect_inputs(&paths);
            println!("Indexing {} file(s)...", inputs.len());

            let pb = spinner("embedding and storing chunks")?;
            let report = app.orchestrator.index_documents(inputs).await;
            pb.finish_and_clear();
            let report = match report {
                Ok(report) => report,
                Err(err) => {
                    // Documents that finished before the abort keep their chunks.
                    if let Ok(stats) = app.orchestrator.stats().await {
                        eprintln!(
                            "Index left with {} documents, {} chunks",
                            stats.total_documents, stats.total_chunks
                        );
                    }
                    return Err(err.into());
                }
            };

            for (source, err) in report.failures() {
                eprintln!("  ✗ {source}: {err}");
            }
            println!("✓ Indexed {} chunks", report.chunks_indexed());
            println!(
                "📊 {} documents, {} chunks in the index",
                report.stats.total_documents, report.stats.total_chunks
            );
        }
        Command::Query { question, top_k, temperature, max_tokens, show_sources } => {
            if let Some(k) = top_k {
                settings.pipeline.top_k = k;
            }
            if let Some(t) = temperature {
                settings.generation.temperature = t;
            }
            if let Some(n) = max_tokens {
                settings.generation.max_tokens = n;
            }
            let app = build(settings).await?;
            if !app.generator.check_health().await {
                eprintln!(
                    "Warning: the generation server may not be running. Make sure it's started on {}",
                    app.settings.generation.base_url
                );
            }

            println!("Querying: {question}\n");
            let pb = spinner("retrieving and generating")?;
            let answer = app.orchestrator.query(&question).await;
            pb.finish_and_clear();
            let answer = answer?;

            println!("Answer:");
            println!("{}", answer.answer);
            println!("\nRetrieved {} context chunks", answer.sources.len());
            if show_sources {
                for (i, source) in answer.sources.iter().enumerate() {
                    println!(
                        "\n[{}] {} (chunk {}/{}, score {:.3})",
                        i + 1,
                        source.chunk.source_id,
                        source.chunk.chunk_index + 1,
                        source.chunk.total_chunks,
                        source.score
                    );
                    println!("{}", source.chunk.text);
                }
            }
        }
        Command::Stats => {
            let app = build(settings).await?;
            let stats = app.orchestrator.stats().await?;
            let config = app.orchestrator.config();
            println!("RAG System Statistics:");
            println!("  Total documents indexed: {}", stats.total_documents);
            println!("  Total chunks indexed: {}", stats.total_chunks);
            println!("  Embedding model: {}", app.embedder.model_id());
            println!("  Chunk size: {}", config.chunk_size);
            println!("  Chunk overlap: {}", config.chunk_overlap);
            println!("  Top-K retrieval: {}", config.top_k);
            println!("  Store: {:?} at {}", app.settings.store.backend, app.settings.store.location);
        }
        Command::Reset => {
            let app = build(settings).await?;
            app.orchestrator.reset().await?;
            println!("✓ Index cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ragflow_core::Error>() {
                Some(e) => eprintln!("Error [{}]: {}", e.kind(), e),
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
