//! Command-line interface for autocapture.
//!
//! This module provides the CLI structure and output helpers for the
//! `autocap` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{ConfigCommand, EventsCommand, OutputFormat, ReplayCommand};

/// autocap - Replay page sessions through the capture pipeline
///
/// Loads a scripted page session, runs it through the capture plugins and
/// prints every payload that would have been recorded.
#[derive(Debug, Parser)]
#[command(name = "autocap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a session script and print captured payloads
    Replay(ReplayCommand),

    /// Inspect the stored event history
    #[command(subcommand)]
    Events(EventsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
