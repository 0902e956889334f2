//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Replay command arguments.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Session script (JSON) to replay
    pub script: PathBuf,

    /// Persistence backend: memory, localStorage, sessionStorage or none
    #[arg(short, long)]
    pub persistence: Option<String>,

    /// Capture categories to enable, comma separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    pub capture: Vec<String>,

    /// Pace events by their script timestamps
    #[arg(long)]
    pub realtime: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "ndjson")]
    pub format: OutputFormat,
}

/// Stored event history commands.
#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// List events stored in the local storage database
    List {
        /// Only show the most recent N events
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove the stored event history
    Clear,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for captured payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array, printed at the end
    Json,
    /// One JSON object per line, printed as captured
    #[default]
    Ndjson,
    /// Aligned columns
    Table,
}
