//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragkit",
    version,
    author = "neur0map",
    about = "Embedding, chunking and hybrid retrieval for retrieval-augmented generation",
    long_about = "ragkit normalizes an embedding provider's wire protocol into fixed-dimension vectors, \
                  splits documents into overlapping chunks, and retrieves them with fused vector and \
                  keyword search."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragkit/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed texts with the configured provider and report the vectors
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,

        /// Number of leading components to print per vector
        #[arg(long, default_value = "5")]
        preview: usize,
    },

    /// Ingest a directory of text files and run a hybrid query over it
    Query {
        /// Search query text
        query: String,

        /// Directory of .txt / .md documents to ingest
        #[arg(short, long, value_name = "DIR")]
        docs: PathBuf,

        /// Maximum number of results (defaults to retrieval.top_k)
        #[arg(short)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Split a text file into chunks and print them
    Split {
        /// File to split
        file: PathBuf,

        /// Maximum chunk length in characters (defaults to chunking.max_length)
        #[arg(long)]
        max_length: Option<usize>,

        /// Overlap between consecutive chunks (defaults to chunking.overlap)
        #[arg(long)]
        overlap: Option<usize>,

        /// Show chunks in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section (embedding, chunking, store, retrieval)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
