use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use khabar_core::document::load_corpus;
use khabar_core::persist::{save_docs, save_meta, ArtifactPaths, MetaFile, FORMAT_VERSION};
use khabar_core::{DocId, Document, EngineConfig, InvertedIndex, RankingEngine, WebGraph};
use tracing_subscriber::{fmt, EnvFilter};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the news index and link graph, or query a built snapshot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build index, graph and document store from JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output artifact directory
        #[arg(long)]
        output: PathBuf,
        /// Optional TOML engine config
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run one ranked query against a built snapshot and print JSON
    Query {
        /// Artifact directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config } => {
            let config = EngineConfig::load_or_default(config.as_deref())?;
            build_snapshot(&input, &output, &config)
        }
        Commands::Query { index, q, k, config } => {
            let config = EngineConfig::load_or_default(config.as_deref())?;
            let engine = RankingEngine::load(&ArtifactPaths::new(&index), config.ranking)?;
            let results = engine.rank(&q, k);
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

fn build_snapshot(input: &Path, output: &Path, config: &EngineConfig) -> Result<()> {
    let paths = ArtifactPaths::new(output);
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let docs: Vec<Document> = load_corpus(input)?;
    tracing::info!(num_docs = docs.len(), input = %input.display(), "ingested documents");

    let mut index = InvertedIndex::new();
    index.build(&docs);
    let graph = WebGraph::build(&docs, &index, &config.graph);

    index.save(&paths.index())?;
    graph.save(&paths.graph())?;
    let store: HashMap<DocId, Document> = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
    save_docs(&paths, &store)?;

    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        num_edges: graph.edge_count(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output = %output.display(), num_terms = meta.num_terms, edges = meta.num_edges, "snapshot build complete");
    Ok(())
}
