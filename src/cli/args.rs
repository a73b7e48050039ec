//! Command line argument parsing for the Halberd CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::vector::DistanceMetric;

/// Halberd - embedded vector collections with IVF search
#[derive(Parser, Debug, Clone)]
#[command(name = "halberd")]
#[command(about = "Embedded vector collections with IVF search and retrieval-augmented answering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct HalberdArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl HalberdArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fill a collection with random records, then run vector, filtered and
    /// attribute-only searches
    #[command(name = "demo-search")]
    DemoSearch(DemoSearchArgs),

    /// Ingest documents and answer questions from them
    Rag(RagArgs),

    /// Show statistics for a collection built from a config file
    Stats(StatsArgs),
}

/// Arguments for the random-data search demo
#[derive(Parser, Debug, Clone)]
pub struct DemoSearchArgs {
    /// Number of random records to insert
    #[arg(short = 'n', long, default_value = "1000")]
    pub records: usize,

    /// Vector dimension
    #[arg(short, long, default_value = "128")]
    pub dimension: usize,

    /// Distance metric (l2, cosine, ip)
    #[arg(short, long, default_value = "l2")]
    pub metric: DistanceMetric,

    /// Number of IVF clusters
    #[arg(long, default_value = "128")]
    pub nlist: usize,

    /// Clusters visited per search
    #[arg(long, default_value = "1")]
    pub probe_count: usize,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "5")]
    pub limit: usize,

    /// Filter for the second search, as a JSON predicate (default: score > 50)
    #[arg(long, value_name = "JSON")]
    pub filter: Option<String>,

    /// Filter for the attribute-only query, as a JSON predicate (default: score > 70)
    #[arg(long, value_name = "JSON")]
    pub query_filter: Option<String>,

    /// Seed for data generation
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Arguments for retrieval-augmented answering
#[derive(Parser, Debug, Clone)]
pub struct RagArgs {
    /// Text file of documents; paragraphs are separated by blank lines
    /// (default: built-in smart home corpus)
    #[arg(short, long, value_name = "FILE")]
    pub documents: Option<PathBuf>,

    /// Question to answer (repeatable; default: sample questions)
    #[arg(long = "query", value_name = "QUESTION")]
    pub queries: Vec<String>,

    /// Chunks retrieved per question
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,

    /// Embedding dimension
    #[arg(long, default_value = "384")]
    pub dimension: usize,

    /// Number of IVF clusters
    #[arg(long, default_value = "4")]
    pub nlist: usize,

    /// Clusters visited per question
    #[arg(long, default_value = "2")]
    pub probe_count: usize,
}

/// Arguments for collection statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Collection configuration file (JSON)
    #[arg(value_name = "CONFIG_FILE")]
    pub config: PathBuf,

    /// Insert this many random records and build the index first
    #[arg(long, default_value = "0")]
    pub random_records: usize,

    /// Seed for data generation
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
