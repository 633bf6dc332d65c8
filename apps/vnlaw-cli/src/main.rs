//! `vnlaw`: ingest Vietnamese legal articles and query them from the terminal.
//!
//! Results are printed as JSON on stdout; logs go to stderr and follow
//! `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use vnlaw_core::chunker::{ChunkStats, Chunker};
use vnlaw_core::config::{Config, RetrievalMode, Settings};
use vnlaw_core::record::{load_articles, normalize_articles};
use vnlaw_rag::RagPipeline;

#[derive(Parser, Debug)]
#[command(name = "vnlaw")]
#[command(version)]
#[command(about = "Retrieval over Vietnamese legal articles", long_about = None)]
struct Args {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Configuration environment (falls back to RUST_ENV, then "dev")
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize, chunk and index a JSON file or a directory of JSON files
    Ingest {
        path: PathBuf,
        /// Only build the text index
        #[arg(long)]
        skip_vector: bool,
    },
    /// Show how the articles would be chunked, without indexing anything
    Chunk {
        path: PathBuf,
        #[arg(long)]
        max_chars: Option<usize>,
        /// Also print every unit id with its length
        #[arg(long)]
        list: bool,
    },
    /// Retrieve units for a query
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Retrieve and assemble a numbered context block
    Ask {
        question: String,
        /// Maximum number of units in the context
        #[arg(long)]
        units: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Cascade,
    Vector,
}

impl From<ModeArg> for RetrievalMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Cascade => RetrievalMode::Cascade,
            ModeArg::Vector => RetrievalMode::Vector,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(dir: &Path, env_name: Option<&str>) -> Result<Settings> {
    let config = match env_name {
        Some(name) => Config::load_from_dir(dir, name)?,
        None => Config::load_from_dir(dir, &std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()))?,
    };
    let mut settings = config.settings().context("loading settings")?;
    settings.anchor_paths(dir);
    Ok(settings)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ingest(settings: Settings, path: &Path, skip_vector: bool) -> Result<()> {
    let articles = load_articles(path).with_context(|| format!("reading articles from {}", path.display()))?;
    tracing::info!(articles = articles.len(), path = %path.display(), "loaded articles");
    let pipeline = RagPipeline::open(settings, !skip_vector)?;

    let pb = ProgressBar::hidden();
    if pipeline.has_vector() {
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%)")?
                .progress_chars("#>-"),
        );
    }
    let report = pipeline.ingest_with_progress(articles, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish_and_clear();
    print_json(&report)
}

fn chunk(mut settings: Settings, path: &Path, max_chars: Option<usize>, list: bool) -> Result<()> {
    if let Some(n) = max_chars {
        settings.chunking.max_chunk_chars = n;
        settings.validate()?;
    }
    let articles = load_articles(path).with_context(|| format!("reading articles from {}", path.display()))?;
    let normalized = normalize_articles(articles, settings.ingest.min_body_chars);
    let chunker = Chunker::from_settings(&settings.chunking);
    let units = chunker.chunk_all(&normalized.documents);
    if list {
        for u in &units {
            println!("{}\t{}\t{}", u.id, u.body.chars().count(), u.title);
        }
    }
    let stats = ChunkStats::collect(normalized.documents.len(), &units, chunker.max_chars());
    tracing::info!(skipped = normalized.skipped, "chunked articles");
    print_json(&stats)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = load_settings(&args.config_dir, args.env.as_deref())?;

    match args.command {
        Command::Ingest { path, skip_vector } => ingest(settings, &path, skip_vector),
        Command::Chunk { path, max_chars, list } => chunk(settings, &path, max_chars, list),
        Command::Search { query, limit, mode } => {
            if let Some(m) = mode {
                settings.retrieval.mode = m.into();
            }
            let limit = limit.unwrap_or(settings.retrieval.target_count);
            let with_vector = settings.retrieval.mode == RetrievalMode::Vector;
            let pipeline = RagPipeline::open(settings, with_vector)?;
            print_json(&pipeline.retrieve_with_outcome(&query, limit))
        }
        Command::Ask { question, units, mode } => {
            if let Some(m) = mode {
                settings.retrieval.mode = m.into();
            }
            if let Some(n) = units {
                settings.context.max_units = n;
            }
            let with_vector = settings.retrieval.mode == RetrievalMode::Vector;
            let pipeline = RagPipeline::open(settings, with_vector)?;
            print_json(&pipeline.ask(&question))
        }
    }
}
