//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NEHNES: signature-based malware scanner for directory trees
#[derive(Parser, Debug)]
#[command(name = "nehnes-av")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory tree for malware
    Scan {
        /// Root directory (or single file) to scan
        path: PathBuf,

        /// Use basic signature matching only
        #[arg(long, conflicts_with = "rules")]
        basic: bool,

        /// Rule database directory for the advanced engine
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Delete every infected file after the scan
        #[arg(long, conflicts_with = "delete")]
        delete_all: bool,

        /// Delete these infected files after the scan
        #[arg(long, num_args = 1..)]
        delete: Vec<PathBuf>,
    },

    /// Delete files
    Delete {
        /// Files to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the built-in and configured signatures
    Signatures,

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show application information
    Info,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
