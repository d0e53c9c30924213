//! Analyze command: per-file coverage and offset summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use li_core::{Interleaved, SourceTag, format_clock};

use super::util;
use crate::{Config, SourceArgs};

#[derive(Debug, Default)]
struct TagSummary {
    lines: usize,
    timestamped: usize,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &SourceArgs) -> Result<()> {
    let result = util::load(config, args)?;
    write!(writer, "{}", format_analysis(&result))?;
    Ok(())
}

/// Formats the human-readable analysis.
pub fn format_analysis(result: &Interleaved) -> String {
    let mut by_tag: BTreeMap<&SourceTag, TagSummary> = BTreeMap::new();
    for line in &result.lines {
        let summary = by_tag.entry(&line.tag).or_default();
        summary.lines += 1;
        if let Some(ts) = line.timestamp {
            summary.timestamped += 1;
            summary.first = Some(summary.first.map_or(ts, |t| t.min(ts)));
            summary.last = Some(summary.last.map_or(ts, |t| t.max(ts)));
        }
    }
    let timestamped: usize = by_tag.values().map(|s| s.timestamped).sum();

    let mut output = String::new();
    writeln!(output, "=== Analysis ===").unwrap();
    writeln!(output, "Total lines: {}", result.lines.len()).unwrap();
    writeln!(
        output,
        "Timestamped: {timestamped} ({})",
        percent(timestamped, result.lines.len())
    )
    .unwrap();

    if let (Some(first), Some(last)) = (
        result.lines.iter().find_map(|l| l.timestamp),
        result.lines.iter().rev().find_map(|l| l.timestamp),
    ) {
        writeln!(
            output,
            "Span: {} .. {} ({})",
            format_clock(first),
            format_clock(last),
            format_span(last - first)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "Lines by tag:").unwrap();
    for (tag, summary) in &by_tag {
        writeln!(
            output,
            "  {tag}: {} lines, {} timestamped ({})",
            summary.lines,
            summary.timestamped,
            percent(summary.timestamped, summary.lines)
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "Offsets:").unwrap();
    if result.offsets.is_empty() {
        writeln!(output, "  (none)").unwrap();
    }
    for (tag, offset, source) in result.offsets.iter() {
        writeln!(output, "  {tag}: {} ({source})", format_hours(offset)).unwrap();
    }

    if let Some(reference) = &result.reference {
        writeln!(output).unwrap();
        writeln!(
            output,
            "Reference: {} (earliest {})",
            reference.tag,
            reference.earliest.format("%Y-%m-%d %H:%M:%S%.6f")
        )
        .unwrap();
    }

    if !result.unresolved.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "Unresolved uptimes:").unwrap();
        for tag in &result.unresolved {
            writeln!(output, "  {tag}").unwrap();
        }
    }

    output
}

#[expect(
    clippy::cast_precision_loss,
    reason = "line counts are far below f64 precision"
)]
fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / total as f64)
}

fn format_hours(offset: TimeDelta) -> String {
    let minutes = offset.num_minutes();
    let sign = if minutes < 0 { '-' } else { '+' };
    let (hours, rest) = (minutes.abs() / 60, minutes.abs() % 60);
    if rest == 0 {
        format!("{sign}{hours}h")
    } else {
        format!("{sign}{hours}h{rest:02}m")
    }
}

fn format_span(span: TimeDelta) -> String {
    let secs = span.num_seconds();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
