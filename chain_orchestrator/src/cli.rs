//! Command-line interface definitions using clap derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Capability chain orchestrator CLI
#[derive(Parser)]
#[command(name = "chain-cli")]
#[command(about = "Evaluate a request, select capabilities and run them as a chain")]
#[command(version)]
pub struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository containing .github/agents (overrides configuration)
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select capabilities automatically and run the chain
    Run {
        #[arg(short, long)]
        prompt: String,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the named capabilities in the given order
    Chain {
        /// Comma-separated capability names
        #[arg(short, long, value_delimiter = ',', required = true)]
        agents: Vec<String>,
        #[arg(short, long)]
        prompt: String,
        #[arg(long)]
        json: bool,
    },
    /// List registered capabilities
    List {
        #[arg(long)]
        json: bool,
    },
    /// Score a prompt without running anything
    Evaluate {
        #[arg(short, long)]
        prompt: String,
    },
}
