//! Core logic for merging logs from independently clocked processes.
//!
//! This crate contains the fundamental types and logic for:
//! - Timestamp parsing: glog, date-time, epoch and uptime conventions
//! - Uptime resolution: anchoring relative uptimes to nearby absolute lines
//! - Alignment: whole-hour offsets between files written on different machines
//! - Merging: one stable, chronological stream across all files
//! - Metrics: regex extraction of numeric series from merged lines

pub mod align;
pub mod interleaver;
pub mod line;
pub mod merge;
pub mod metrics;
pub mod parser;
pub mod resolve;
pub mod timestamp;
mod types;

pub use align::{OffsetSource, OffsetTable, Reference, auto_align};
pub use interleaver::{InterleaveError, Interleaved, Interleaver};
pub use line::{ParsedLine, ResolvedLine, SourceFile};
pub use merge::{format_line, interleave};
pub use metrics::{MetricError, MetricExtractor, MetricPoint, MetricSeries, PatternConfig};
pub use parser::{LineParser, detect_timestamp};
pub use resolve::{AnchorWindow, ResolveError, resolve_uptimes};
pub use timestamp::{ParseOptions, Timestamp, Uptime, format_clock};
pub use types::{SourceTag, ValidationError};
