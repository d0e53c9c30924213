//! Log interleaver CLI library.
//!
//! This crate provides the CLI interface for merging log directories.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SourceArgs};
pub use config::{Config, ExportConfig};
