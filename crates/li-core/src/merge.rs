//! Chronological merge of resolved files.

use std::cmp::Ordering;

use crate::align::OffsetTable;
use crate::line::{ResolvedLine, SourceFile};
use crate::timestamp::format_clock;

/// Applies offsets and merges every file into one ordered sequence.
///
/// Files are taken in tag order. Timestamped lines sort by instant; exact
/// ties keep insertion order (tag, then position in file). Lines without a
/// timestamp go last, ordered by their line number within their own file.
pub fn interleave(
    mut files: Vec<SourceFile<ResolvedLine>>,
    offsets: &OffsetTable,
) -> Vec<ResolvedLine> {
    files.sort_by(|a, b| a.tag.cmp(&b.tag));

    let mut merged: Vec<ResolvedLine> = files
        .into_iter()
        .flat_map(|file| {
            let offset = offsets.get(&file.tag);
            file.lines.into_iter().map(move |line| line.shifted(offset))
        })
        .collect();

    // sort_by is stable, which is what keeps exact ties deterministic.
    merged.sort_by(compare_lines);
    merged
}

fn compare_lines(a: &ResolvedLine, b: &ResolvedLine) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.line_number.cmp(&b.line_number),
    }
}

/// Formats a merged line as `HH:MM:SS.ffffff <tag> <text>`.
///
/// Lines without a timestamp are returned unchanged.
pub fn format_line(line: &ResolvedLine) -> String {
    match line.timestamp {
        Some(instant) => format!("{} {} {}", format_clock(instant), line.tag, line.text),
        None => line.text.clone(),
    }
}
