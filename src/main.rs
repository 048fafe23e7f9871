//! CLI entry point for cluster-scoped document search.
//!
//! Loads a directory of normalized `.txt` documents, indexes and clusters
//! them, then answers one search, recommendation, cluster or evaluation
//! request. Nothing is persisted between runs.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use clusearch::engine::{ClusterOverview, EngineConfig, SearchEngine};
use clusearch::evaluation::{EvaluationReport, RelevanceJudgment};
use clusearch::summary::generate_summary;
use clusearch::vector::{ClusterId, ClusterScore, RankedResult};
use clusearch::{DocumentId, EngineError, Settings, load_documents};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Cluster-scoped document search and recommendation
#[derive(Parser)]
#[command(
    name = "clusearch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Cluster-scoped document search and recommendation",
    long_about = "Index normalized text documents, group them into topical clusters, \
                  search within the best matching cluster and recommend similar documents.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of normalized .txt documents (overrides config)
    #[arg(short, long, global = true, env = "CLUSEARCH_DOCS")]
    docs: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .clusearch directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .clusearch/settings.toml")]
    Config,

    /// Search the best matching cluster
    #[command(
        about = "Rank the documents of the cluster that best matches a query",
        after_help = "Examples:\n  clusearch search \"championship final score\"\n  clusearch search \"interest rates\" --threshold 0.1 --json"
    )]
    Search {
        query: String,

        /// Minimum similarity (overrides config)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend documents similar to an indexed one
    #[command(about = "Rank the whole corpus by similarity to a document")]
    Recommend {
        /// Document id (file stem)
        doc_id: String,

        /// Minimum similarity (overrides config)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show cluster membership
    #[command(about = "List clusters with member counts and optional query scores")]
    Clusters {
        /// Also show each cluster's aggregate score for this query
        #[arg(short, long)]
        query: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score search quality for a query
    #[command(
        about = "Compute precision, recall, F1 and NDCG of a search",
        long_about = "Runs a search and scores it. Relevant documents are the given ids, \
                      or every document containing the query text when none are given."
    )]
    Evaluate {
        query: String,

        /// Ids of the relevant documents
        #[arg(short, long, num_args = 1..)]
        relevant: Vec<String>,

        /// NDCG cutoff (overrides config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct SearchHit {
    #[serde(flatten)]
    result: RankedResult,
    excerpt: String,
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    cluster: Option<ClusterId>,
    cluster_scores: Vec<ClusterScore>,
    results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
struct ClustersOutput {
    #[serde(flatten)]
    overview: ClusterOverview,
    #[serde(skip_serializing_if = "Option::is_none")]
    scores: Option<Vec<ClusterScore>>,
}

#[derive(Debug, Serialize)]
struct EvaluateOutput<'a> {
    query: &'a str,
    #[serde(flatten)]
    report: EvaluationReport,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        if let Some(engine_error) = e.downcast_ref::<EngineError>() {
            for suggestion in engine_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(EngineError::Config)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            if let Err(warning) = Settings::check_init() {
                eprintln!("Warning: {warning}");
                eprintln!("Using default configuration for now.");
            }
            Settings::load()
                .map_err(EngineError::Config)
                .context("Failed to load configuration")
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Failed to create configuration file")?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(());
    }

    let settings = load_settings(&cli)?;
    init_tracing(cli.verbose || settings.debug);

    if let Commands::Config = &cli.command {
        println!("Current Configuration:");
        println!("{}", "=".repeat(50));
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    let engine = SearchEngine::new(EngineConfig::try_from(&settings)?)?;
    let docs_dir = cli
        .docs
        .clone()
        .unwrap_or_else(|| settings.resolved_documents_path());
    let documents = load_documents(&docs_dir)?;
    engine.add_documents(documents)?;

    match cli.command {
        Commands::Search {
            query,
            threshold,
            json,
        } => {
            engine.perform_clustering()?;
            let threshold = threshold.unwrap_or(engine.config().search_threshold);
            let snapshot = engine.snapshot()?;
            let routed = snapshot.search(&query, threshold, engine.config().aggregation)?;
            let results = routed
                .results
                .into_iter()
                .map(|result| {
                    let text = &snapshot.index().documents()[result.position].text;
                    SearchHit {
                        excerpt: generate_summary(text, &query),
                        result,
                    }
                })
                .collect();
            let output = SearchOutput {
                query: &query,
                cluster: routed.cluster,
                cluster_scores: routed.cluster_scores,
                results,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_search(&output);
            }
        }

        Commands::Recommend {
            doc_id,
            threshold,
            json,
        } => {
            let threshold = threshold.unwrap_or(engine.config().recommend_threshold);
            let results = engine.recommend_with_threshold(&DocumentId::from(doc_id.as_str()), threshold)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No documents similar to '{doc_id}' above threshold {threshold}");
            } else {
                println!("Documents similar to '{doc_id}':");
                print_results(&results);
            }
        }

        Commands::Clusters { query, json } => {
            let overview = engine.perform_clustering()?;
            let scores = query.as_deref().map(|q| engine.score_clusters(q)).transpose()?;
            let output = ClustersOutput { overview, scores };
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_clusters(&output);
            }
        }

        Commands::Evaluate {
            query,
            relevant,
            k,
            json,
        } => {
            engine.perform_clustering()?;
            let judgment = (!relevant.is_empty()).then(|| RelevanceJudgment::explicit(relevant));
            let k = k.unwrap_or(engine.config().ndcg_k);
            let report = engine.evaluate_with_k(&query, judgment.as_ref(), k)?;
            let output = EvaluateOutput {
                query: &query,
                report,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Query: {query}");
                println!("Relevant documents: {}", report.relevant);
                println!("  precision: {:.4}", report.precision);
                println!("  recall:    {:.4}", report.recall);
                println!("  f1:        {:.4}", report.f1);
                println!("  ndcg@{k}:   {:.4}", report.ndcg);
            }
        }

        Commands::Init { .. } | Commands::Config => {
            // Handled above
        }
    }

    Ok(())
}

fn print_results(results: &[RankedResult]) {
    for (rank, result) in results.iter().enumerate() {
        let location = result
            .source
            .as_ref()
            .map(|p| format!(" ({})", p.display()))
            .unwrap_or_default();
        println!(
            "{:>3}. {:.4}  {}{location}",
            rank + 1,
            result.score.get(),
            result.title.as_deref().unwrap_or(result.id.as_str())
        );
    }
}

fn print_search(output: &SearchOutput<'_>) {
    match output.cluster {
        Some(cluster) => println!("Query routed to cluster {cluster}"),
        None => println!("No clusters available"),
    }
    for score in &output.cluster_scores {
        println!(
            "  cluster {}: {} document(s), score {:.4}",
            score.cluster, score.members, score.score
        );
    }

    if output.results.is_empty() {
        println!("No results above threshold");
        return;
    }

    println!();
    for (rank, hit) in output.results.iter().enumerate() {
        println!(
            "{:>3}. {:.4}  {}",
            rank + 1,
            hit.result.score.get(),
            hit.result.title.as_deref().unwrap_or(hit.result.id.as_str())
        );
        if !hit.excerpt.is_empty() {
            println!("     {}", hit.excerpt);
        }
    }
}

fn print_clusters(output: &ClustersOutput) {
    for stats in &output.overview.clusters {
        let score = output
            .scores
            .as_ref()
            .and_then(|scores| scores.iter().find(|s| s.cluster == stats.cluster))
            .map(|s| format!(", score {:.4}", s.score))
            .unwrap_or_default();
        println!("Cluster {}: {} document(s){score}", stats.cluster, stats.members);
    }
    if output.overview.noise > 0 {
        println!("Noise: {} document(s)", output.overview.noise);
    }
}
