//! Per-file line parsing.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::line::{ParsedLine, SourceFile};
use crate::timestamp::{self, ParseOptions, Timestamp};
use crate::types::SourceTag;

/// Buffer size for `BufReader` (64KB for optimal performance on large files)
const BUFFER_SIZE: usize = 64 * 1024;

/// Recognizes the timestamp on a single line.
///
/// Conventions are tried in a fixed priority order and the first match wins:
/// glog absolute, full date-time, bracketed epoch, bracketed uptime, and
/// finally (when enabled) a JSON `timestamp` field.
pub fn detect_timestamp(line: &str, options: &ParseOptions) -> Option<Timestamp> {
    if let Some(ts) = timestamp::parse_absolute_compact(line, options.reference_year) {
        return Some(Timestamp::Absolute(ts));
    }
    if let Some(ts) = timestamp::parse_full_datetime(line) {
        return Some(Timestamp::Absolute(ts));
    }
    if let Some(ts) = timestamp::parse_epoch(line) {
        return Some(Timestamp::Absolute(ts));
    }
    if let Some(uptime) = timestamp::parse_uptime(line) {
        return Some(Timestamp::Uptime(uptime));
    }
    if options.json_timestamps {
        return timestamp::parse_json_timestamp(line).map(Timestamp::Absolute);
    }
    None
}

/// Parses the lines of one source, tagging each with the source's tag.
#[derive(Debug, Clone)]
pub struct LineParser {
    tag: SourceTag,
    options: ParseOptions,
}

impl LineParser {
    pub const fn new(tag: SourceTag, options: ParseOptions) -> Self {
        Self { tag, options }
    }

    pub const fn tag(&self) -> &SourceTag {
        &self.tag
    }

    pub fn parse_line(&self, text: String, line_number: usize) -> ParsedLine {
        let timestamp = detect_timestamp(&text, &self.options);
        ParsedLine {
            text,
            tag: self.tag.clone(),
            line_number,
            timestamp,
        }
    }

    /// Reads every line from `reader`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; only I/O failures are
    /// errors. Trailing `\r` is stripped.
    pub fn parse_reader<R: BufRead>(&self, mut reader: R) -> io::Result<SourceFile<ParsedLine>> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let text = String::from_utf8_lossy(&buf).into_owned();
            lines.push(self.parse_line(text, lines.len() + 1));
        }

        Ok(SourceFile::new(self.tag.clone(), lines))
    }

    pub fn parse_file(&self, path: &Path) -> io::Result<SourceFile<ParsedLine>> {
        let file = File::open(path)?;
        self.parse_reader(BufReader::with_capacity(BUFFER_SIZE, file))
    }
}
