//! CLI subcommand implementations.

pub mod analyze;
pub mod export;
pub mod merge;
pub mod util;
