//! Command-line surface for operating a lexlink corpus: ingestion,
//! reindexing, link extraction, ad-hoc queries and answer validation.

pub mod commands;
pub mod config;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Operator tools for the lexlink retrieval system.
#[derive(Debug, Parser)]
#[command(name = "lexlink", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./lexlink.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Declared type of an ingested source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocTypeArg {
    Statute,
    Case,
    Rule,
}

impl From<DocTypeArg> for lexlink_core::DocType {
    fn from(value: DocTypeArg) -> Self {
        match value {
            DocTypeArg::Statute => lexlink_core::DocType::Statute,
            DocTypeArg::Case => lexlink_core::DocType::Case,
            DocTypeArg::Rule => lexlink_core::DocType::Rule,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse raw source files into the corpus
    Ingest {
        /// Declared document type; auto-detected when omitted
        #[arg(long, value_enum)]
        doc_type: Option<DocTypeArg>,
        /// Plain-text source files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Rebuild the lexical index into a fresh generation and swap
    ReindexLex,

    /// Re-embed the corpus and rebuild the dense index into a fresh
    /// generation
    ReindexDense,

    /// Run rule-based link extraction over case paragraphs
    ExtractLinks {
        /// Write candidates to this JSON file instead of merging them
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Load curated interpretation links from a JSON file
    PopulateLinks {
        /// JSON file of links
        file: PathBuf,
    },

    /// Run a retrieval query against the current generations
    Query {
        /// The query text
        text: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Disable interpretation-link boosting
        #[arg(long)]
        no_links: bool,
        /// Also print the formatted generation context
        #[arg(long)]
        show_context: bool,
    },

    /// Validate a generated answer
    Validate {
        /// File containing the answer text
        answer_file: PathBuf,
        /// The originating query
        #[arg(long)]
        query: Option<String>,
        /// JSON file of context documents handed to the generator
        #[arg(long)]
        context_file: Option<PathBuf>,
    },

    /// Print corpus and link-store statistics
    Stats,

    /// Render the document tree under a root
    Tree {
        /// Root document id
        doc_id: String,
    },
}
