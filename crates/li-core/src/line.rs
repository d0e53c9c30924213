//! Log line records.
//!
//! Lines move through two immutable stages. Parsing produces [`ParsedLine`],
//! which may still carry a relative uptime. Resolution produces
//! [`ResolvedLine`], which carries at most an absolute instant. Later steps
//! (offsets, sorting) build new records instead of mutating shared ones.

use chrono::{DateTime, TimeDelta, Utc};

use crate::timestamp::{Timestamp, Uptime};
use crate::types::SourceTag;

/// A line as read from its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub text: String,
    pub tag: SourceTag,
    /// 1-based position within the source file.
    pub line_number: usize,
    pub timestamp: Option<Timestamp>,
}

impl ParsedLine {
    pub fn absolute(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(Timestamp::absolute)
    }

    pub fn uptime(&self) -> Option<Uptime> {
        self.timestamp.as_ref().and_then(Timestamp::uptime)
    }
}

/// A line whose timestamp, if any, is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub text: String,
    pub tag: SourceTag,
    /// 1-based position within the source file.
    pub line_number: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ResolvedLine {
    /// Carries a parsed line over, keeping only an absolute timestamp.
    ///
    /// An uptime that was never resolved is dropped.
    pub fn unresolved(line: &ParsedLine) -> Self {
        Self::with_timestamp(line, line.absolute())
    }

    /// Carries a parsed line over with the given timestamp.
    pub fn with_timestamp(line: &ParsedLine, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            text: line.text.clone(),
            tag: line.tag.clone(),
            line_number: line.line_number,
            timestamp,
        }
    }

    /// Returns this line moved by `offset` along the time axis.
    ///
    /// A shift past the representable range leaves the line untimed.
    #[must_use]
    pub fn shifted(self, offset: TimeDelta) -> Self {
        if offset.is_zero() {
            return self;
        }
        let timestamp = self.timestamp.and_then(|t| {
            let moved = t.checked_add_signed(offset);
            if moved.is_none() {
                tracing::warn!(
                    tag = %self.tag,
                    line = self.line_number,
                    %offset,
                    "offset moves timestamp out of range, leaving line untimed"
                );
            }
            moved
        });
        Self { timestamp, ..self }
    }
}

/// All lines read from one file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile<L> {
    pub tag: SourceTag,
    pub lines: Vec<L>,
}

impl<L> SourceFile<L> {
    pub const fn new(tag: SourceTag, lines: Vec<L>) -> Self {
        Self { tag, lines }
    }
}

impl SourceFile<ParsedLine> {
    pub fn has_uptime(&self) -> bool {
        self.lines.iter().any(|l| l.uptime().is_some())
    }
}

impl SourceFile<ResolvedLine> {
    /// Earliest absolute instant in the file.
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.lines.iter().filter_map(|l| l.timestamp).min()
    }

    /// Number of lines carrying a timestamp.
    pub fn timestamped_count(&self) -> usize {
        self.lines.iter().filter(|l| l.timestamp.is_some()).count()
    }
}
