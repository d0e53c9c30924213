//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Log interleaver.
///
/// Merges log files written by independently clocked processes into one
/// chronological stream, resolving uptimes and whole-hour clock offsets.
#[derive(Debug, Parser)]
#[command(name = "li", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print every line of the log directory on one timeline.
    Merge {
        #[command(flatten)]
        source: SourceArgs,

        /// Write merged lines to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize line counts, timestamp coverage and applied offsets.
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Export metric series extracted with the configured patterns.
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Write series as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write series as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

/// Where to read logs from and how to align them.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Directory containing the log files (overrides config).
    #[arg(short, long)]
    pub logs: Option<PathBuf>,

    /// Manual offset as TAG:HOURS (e.g. e825:5 or daemon:-1.5). Repeatable.
    #[arg(long = "offset", value_name = "TAG:HOURS", value_delimiter = ',')]
    pub offsets: Vec<String>,

    /// Disable automatic whole-hour alignment.
    #[arg(long)]
    pub no_auto_align: bool,

    /// Year assumed for timestamps that omit it.
    #[arg(long)]
    pub year: Option<i32>,
}
