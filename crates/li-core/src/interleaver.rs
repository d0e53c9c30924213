//! Directory-level pipeline: discover, parse, resolve, align, merge.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

use crate::align::{self, DEFAULT_REFERENCE_TAG, OffsetError, OffsetTable, Reference};
use crate::line::{ParsedLine, ResolvedLine, SourceFile};
use crate::merge;
use crate::parser::LineParser;
use crate::resolve::{AnchorWindow, resolve_uptimes};
use crate::timestamp::ParseOptions;
use crate::types::{SourceTag, ValidationError};

/// Extension PTP capture files are written with.
pub const DEFAULT_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum InterleaveError {
    #[error("failed to read log directory {}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to read log file {}", path.display())]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("{} and {} both map to tag '{tag}'", first.display(), second.display())]
    DuplicateTag {
        tag: SourceTag,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(transparent)]
    InvalidTag(#[from] ValidationError),

    #[error("invalid offset for '{tag}'")]
    InvalidOffset {
        tag: String,
        source: OffsetError,
    },
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct Interleaved {
    /// Every input line, globally ordered.
    pub lines: Vec<ResolvedLine>,
    /// Offsets applied, manual and computed.
    pub offsets: OffsetTable,
    /// Reference file used by auto-alignment, if it ran and found one.
    pub reference: Option<Reference>,
    /// Files whose uptime lines had no anchor and were left untimed.
    pub unresolved: Vec<SourceTag>,
}

/// Merges every log file in a directory onto one timeline.
#[derive(Debug, Clone)]
pub struct Interleaver {
    log_dir: PathBuf,
    parse_options: ParseOptions,
    offsets: OffsetTable,
    auto_align: bool,
    anchor_window: AnchorWindow,
    reference_tag: String,
    extension: Option<String>,
}

impl Interleaver {
    pub fn new(log_dir: impl Into<PathBuf>, parse_options: ParseOptions) -> Self {
        Self {
            log_dir: log_dir.into(),
            parse_options,
            offsets: OffsetTable::new(),
            auto_align: true,
            anchor_window: AnchorWindow::default(),
            reference_tag: DEFAULT_REFERENCE_TAG.to_string(),
            extension: Some(DEFAULT_EXTENSION.to_string()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Sets a manual offset in hours. Manual offsets are never recomputed.
    pub fn with_offset(mut self, tag: &str, hours: f64) -> Result<Self, InterleaveError> {
        let source_tag = SourceTag::new(tag)?;
        self.offsets
            .set_manual_hours(source_tag, hours)
            .map_err(|source| InterleaveError::InvalidOffset {
                tag: tag.to_string(),
                source,
            })?;
        Ok(self)
    }

    #[must_use]
    pub const fn parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    #[must_use]
    pub const fn auto_align(mut self, enabled: bool) -> Self {
        self.auto_align = enabled;
        self
    }

    #[must_use]
    pub const fn anchor_window(mut self, window: AnchorWindow) -> Self {
        self.anchor_window = window;
        self
    }

    #[must_use]
    pub fn reference_tag(mut self, tag: impl Into<String>) -> Self {
        self.reference_tag = tag.into();
        self
    }

    /// Only read files with this extension. `None` reads every file.
    #[must_use]
    pub fn extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    /// Reads, resolves and merges every file in the log directory.
    pub fn run(&self) -> Result<Interleaved, InterleaveError> {
        let sources = self.discover()?;
        tracing::debug!(dir = %self.log_dir.display(), files = sources.len(), "discovered log files");

        let parsed = sources
            .par_iter()
            .map(|(tag, path)| {
                LineParser::new(tag.clone(), self.parse_options)
                    .parse_file(path)
                    .map_err(|source| InterleaveError::ReadFile {
                        path: path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.merge_sources(parsed))
    }

    /// Resolves, aligns and merges already-parsed files.
    pub fn merge_sources(&self, mut parsed: Vec<SourceFile<ParsedLine>>) -> Interleaved {
        parsed.sort_by(|a, b| a.tag.cmp(&b.tag));

        let mut unresolved = Vec::new();
        let resolved: Vec<SourceFile<ResolvedLine>> = parsed
            .iter()
            .map(|file| {
                let lines = match resolve_uptimes(&file.lines, &self.anchor_window) {
                    Ok(lines) => lines,
                    Err(err) => {
                        tracing::warn!(tag = %file.tag, error = %err, "leaving uptime timestamps unresolved");
                        unresolved.push(file.tag.clone());
                        file.lines.iter().map(ResolvedLine::unresolved).collect()
                    }
                };
                SourceFile::new(file.tag.clone(), lines)
            })
            .collect();

        let mut offsets = self.offsets.clone();
        let reference = if self.auto_align {
            align::auto_align(&resolved, &mut offsets, &self.reference_tag)
        } else {
            None
        };

        let lines = merge::interleave(resolved, &offsets);
        Interleaved {
            lines,
            offsets,
            reference,
            unresolved,
        }
    }

    /// Lists candidate files, sorted by tag.
    fn discover(&self) -> Result<Vec<(SourceTag, PathBuf)>, InterleaveError> {
        let read_dir_err = |source: io::Error| InterleaveError::ReadDir {
            path: self.log_dir.clone(),
            source,
        };

        let mut sources = Vec::new();
        for entry in fs::read_dir(&self.log_dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if !self.accepts(&path) {
                continue;
            }
            sources.push((SourceTag::from_path(&path)?, path));
        }

        sources.sort();
        if let Some(pair) = sources.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(InterleaveError::DuplicateTag {
                tag: pair[0].0.clone(),
                first: pair[0].1.clone(),
                second: pair[1].1.clone(),
            });
        }
        Ok(sources)
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping file with a non-UTF-8 name");
            return false;
        };
        if name.starts_with('.') || !path.is_file() {
            return false;
        }
        self.extension
            .as_deref()
            .is_none_or(|ext| path.extension().is_some_and(|e| e == ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::format_line;

    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, lines: &[&str]) {
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn interleaver(dir: &TempDir) -> Interleaver {
        Interleaver::new(dir.path(), ParseOptions::new(2026))
    }

    fn formatted(result: &Interleaved) -> Vec<String> {
        result.lines.iter().map(format_line).collect()
    }

    /// Three sources in three conventions; `e825` runs five hours behind.
    fn ptp_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "daemon.txt",
            &[
                "I0111 14:05:50.000100 daemon: starting",
                "ptp4l[275401.719]: rms 4 max 7",
                "I0111 14:05:54.000549 daemon: offset ok",
                "  continuation without timestamp",
            ],
        );
        write(
            &dir,
            "e825.txt",
            &[
                "2026-01-11 09:05:51 ts2phc: locked",
                "2026-01-11 09:05:53 ts2phc: offset 3",
            ],
        );
        write(
            &dir,
            "tbc.txt",
            &["T-BC[1768140352]: clock state LOCKED"], // 14:05:52 UTC
        );
        dir
    }

    #[test]
    fn merges_three_conventions_on_one_timeline() {
        let dir = ptp_fixture();
        let result = interleaver(&dir).run().unwrap();

        assert_eq!(
            formatted(&result),
            [
                "14:05:50.000100 daemon I0111 14:05:50.000100 daemon: starting",
                "14:05:51.000000 e825 2026-01-11 09:05:51 ts2phc: locked",
                "14:05:52.000000 tbc T-BC[1768140352]: clock state LOCKED",
                "14:05:53.000000 e825 2026-01-11 09:05:53 ts2phc: offset 3",
                "14:05:54.000549 daemon ptp4l[275401.719]: rms 4 max 7",
                "14:05:54.000549 daemon I0111 14:05:54.000549 daemon: offset ok",
                "  continuation without timestamp",
            ]
        );
        assert_eq!(result.reference.unwrap().tag, "daemon");
        assert_eq!(
            result.offsets.get(&SourceTag::new("e825").unwrap()),
            chrono::TimeDelta::hours(5)
        );
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn merged_timestamps_are_non_decreasing() {
        let dir = ptp_fixture();
        let result = interleaver(&dir).run().unwrap();
        let stamps: Vec<_> = result.lines.iter().filter_map(|l| l.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn running_twice_is_identical() {
        let dir = ptp_fixture();
        let first = formatted(&interleaver(&dir).run().unwrap());
        let second = formatted(&interleaver(&dir).run().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn manual_offset_overrides_auto_alignment() {
        let dir = ptp_fixture();
        let result = interleaver(&dir).with_offset("e825", 4.5).unwrap().run().unwrap();
        let e825 = result
            .lines
            .iter()
            .find(|l| l.tag == "e825")
            .and_then(|l| l.timestamp)
            .unwrap();
        assert_eq!(crate::timestamp::format_clock(e825), "13:35:51.000000");
    }

    #[test]
    fn disabled_auto_align_leaves_clocks_alone() {
        let dir = ptp_fixture();
        let result = interleaver(&dir).auto_align(false).run().unwrap();
        assert!(result.reference.is_none());
        assert!(result.offsets.is_empty());
        assert_eq!(result.lines[0].tag, "e825");
    }

    #[test]
    fn uptime_only_file_stays_unresolved() {
        let dir = TempDir::new().unwrap();
        write(&dir, "phc.txt", &["phc2sys[10.000]: a", "phc2sys[11.000]: b"]);

        let result = interleaver(&dir).run().unwrap();
        assert!(result.lines.iter().all(|l| l.timestamp.is_none()));
        assert_eq!(result.unresolved, [SourceTag::new("phc").unwrap()]);
        assert!(result.reference.is_none());
        assert_eq!(formatted(&result), ["phc2sys[10.000]: a", "phc2sys[11.000]: b"]);
    }

    #[test]
    fn skips_other_extensions_and_hidden_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "daemon.txt", &["I0111 10:00:00.000000 a"]);
        write(&dir, "notes.md", &["I0111 09:00:00.000000 ignored"]);
        write(&dir, ".daemon.txt.swp", &["junk"]);
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let result = interleaver(&dir).run().unwrap();
        assert_eq!(result.lines.len(), 1);

        let all = interleaver(&dir).extension(None).run().unwrap();
        assert_eq!(all.lines.len(), 2);
    }

    #[test]
    fn manual_offset_past_range_leaves_line_untimed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tbc.txt", &["T-BC[8210266876799]: late"]);

        let result = interleaver(&dir).with_offset("tbc", 1.0).unwrap().run().unwrap();
        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].timestamp.is_none());
    }

    #[test]
    fn auto_offset_past_range_leaves_only_that_line_untimed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "daemon.txt", &["I0111 14:00:00.000000 daemon: up"]);
        write(&dir, "tbc.txt", &["T-BC[0]: boot", "T-BC[8210266000000]: late"]);

        let result = interleaver(&dir).run().unwrap();
        assert!(result.offsets.get(&SourceTag::new("tbc").unwrap()) > chrono::TimeDelta::zero());

        let late = result.lines.iter().find(|l| l.text.ends_with("late")).unwrap();
        assert!(late.timestamp.is_none());
        let boot = result.lines.iter().find(|l| l.text.ends_with("boot")).unwrap();
        assert!(boot.timestamp.is_some());
        assert_eq!(result.lines.last().unwrap().text, late.text);
    }

    #[test]
    fn json_timestamps_are_opt_in() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "gnss.txt",
            &[r#"{"level":"info","timestamp":"2026-01-11T14:05:53.500000000Z","msg":"fix"}"#],
        );

        let plain = interleaver(&dir).run().unwrap();
        assert!(plain.lines[0].timestamp.is_none());

        let json = interleaver(&dir)
            .parse_options(ParseOptions::new(2026).with_json_timestamps(true))
            .run()
            .unwrap();
        let ts = json.lines[0].timestamp.unwrap();
        assert_eq!(crate::timestamp::format_clock(ts), "14:05:53.500000");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        write(&dir, "daemon.txt", &["I0111 10:00:00.000000 a"]);
        fs::write(
            dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")),
            "I0111 09:00:00.000000 ignored\n",
        )
        .unwrap();

        let result = interleaver(&dir).extension(None).run().unwrap();
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].tag, "daemon");
    }

    #[test]
    fn duplicate_stems_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "daemon.txt", &["a"]);
        write(&dir, "daemon.log", &["b"]);

        let err = interleaver(&dir).extension(None).run().unwrap_err();
        assert!(matches!(err, InterleaveError::DuplicateTag { .. }));
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = Interleaver::new(dir.path().join("nope"), ParseOptions::new(2026))
            .run()
            .unwrap_err();
        assert!(matches!(err, InterleaveError::ReadDir { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn invalid_offset_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            interleaver(&dir).with_offset("e825", f64::NAN),
            Err(InterleaveError::InvalidOffset { .. })
        ));
        assert!(matches!(
            interleaver(&dir).with_offset("", 1.0),
            Err(InterleaveError::InvalidTag(_))
        ));
    }
}
