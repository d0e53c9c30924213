//! Per-file clock offsets and automatic whole-hour alignment.
//!
//! Files written on independently administered machines often disagree by a
//! timezone: a whole number of hours. Auto-alignment picks a reference file
//! and shifts every other file by the rounded hour difference between their
//! earliest timestamps. Sub-hour differences are left alone.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::line::{ResolvedLine, SourceFile};
use crate::types::SourceTag;

/// Tag preferred as the alignment reference when it has timestamps.
pub const DEFAULT_REFERENCE_TAG: &str = "daemon";

/// Largest manual offset accepted, in hours (~114 years).
const MAX_OFFSET_HOURS: f64 = 1_000_000.0;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;
const NANOS_PER_HOUR: i128 = 3_600_000_000_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OffsetError {
    #[error("offset of {hours} hours is out of range")]
    OutOfRange { hours: f64 },
}

/// Where an offset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSource {
    /// Supplied by the user. Never replaced by auto-alignment.
    Manual,
    /// Computed by [`auto_align`].
    Auto,
}

impl OffsetSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for OffsetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed time offset per source tag. Missing tags are offset by zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: BTreeMap<SourceTag, (TimeDelta, OffsetSource)>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a user-supplied offset, replacing any previous entry.
    pub fn set_manual(&mut self, tag: SourceTag, offset: TimeDelta) {
        self.entries.insert(tag, (offset, OffsetSource::Manual));
    }

    /// Sets a user-supplied offset given in (possibly fractional) hours.
    pub fn set_manual_hours(&mut self, tag: SourceTag, hours: f64) -> Result<(), OffsetError> {
        self.set_manual(tag, hours_to_delta(hours)?);
        Ok(())
    }

    /// Records a computed offset unless a manual one exists for `tag`.
    ///
    /// Returns whether the entry was written.
    pub fn set_auto(&mut self, tag: SourceTag, offset: TimeDelta) -> bool {
        if self.is_manual(&tag) {
            return false;
        }
        self.entries.insert(tag, (offset, OffsetSource::Auto));
        true
    }

    pub fn get(&self, tag: &SourceTag) -> TimeDelta {
        self.entries
            .get(tag)
            .map_or(TimeDelta::zero(), |(offset, _)| *offset)
    }

    pub fn source(&self, tag: &SourceTag) -> Option<OffsetSource> {
        self.entries.get(tag).map(|(_, source)| *source)
    }

    pub fn is_manual(&self, tag: &SourceTag) -> bool {
        self.source(tag) == Some(OffsetSource::Manual)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceTag, TimeDelta, OffsetSource)> {
        self.entries
            .iter()
            .map(|(tag, (offset, source))| (tag, *offset, *source))
    }
}

/// Converts fractional hours to a duration with microsecond precision.
pub fn hours_to_delta(hours: f64) -> Result<TimeDelta, OffsetError> {
    if !hours.is_finite() || hours.abs() > MAX_OFFSET_HOURS {
        return Err(OffsetError::OutOfRange { hours });
    }
    // Bounded above, so the cast can't truncate.
    #[allow(clippy::cast_possible_truncation)]
    let micros = (hours * MICROS_PER_HOUR).round() as i64;
    Ok(TimeDelta::microseconds(micros))
}

/// Rounds to the nearest whole hour, halves rounding up (toward +∞).
pub fn round_to_hours(delta: TimeDelta) -> TimeDelta {
    // Exact: seconds truncate toward zero and subsec_nanos carries the sign.
    let nanos = i128::from(delta.num_seconds()) * 1_000_000_000 + i128::from(delta.subsec_nanos());
    let hours = (nanos + NANOS_PER_HOUR / 2).div_euclid(NANOS_PER_HOUR);
    // |delta| fits in i64 milliseconds, so its hour count fits a TimeDelta.
    i64::try_from(hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::zero())
}

/// The file everything else is aligned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub tag: SourceTag,
    /// Earliest timestamp in the reference file.
    pub earliest: DateTime<Utc>,
}

/// Picks the alignment reference.
///
/// `preferred` wins if it has any timestamped line. Otherwise the file with
/// the most timestamped lines wins, the first one in `files` on ties.
pub fn choose_reference(files: &[SourceFile<ResolvedLine>], preferred: &str) -> Option<Reference> {
    let preferred_file = files
        .iter()
        .find(|f| f.tag == preferred)
        .and_then(|f| f.earliest().map(|earliest| (f, earliest)));
    if let Some((file, earliest)) = preferred_file {
        return Some(Reference {
            tag: file.tag.clone(),
            earliest,
        });
    }

    let mut best: Option<(usize, Reference)> = None;
    for file in files {
        let count = file.timestamped_count();
        let Some(earliest) = file.earliest() else {
            continue;
        };
        if best.as_ref().is_none_or(|(best_count, _)| count > *best_count) {
            best = Some((
                count,
                Reference {
                    tag: file.tag.clone(),
                    earliest,
                },
            ));
        }
    }
    best.map(|(_, reference)| reference)
}

/// Computes whole-hour offsets for every file without a manual offset.
///
/// Returns the reference used, or `None` when no file has any timestamp (in
/// which case nothing is written).
pub fn auto_align(
    files: &[SourceFile<ResolvedLine>],
    table: &mut OffsetTable,
    preferred: &str,
) -> Option<Reference> {
    let Some(reference) = choose_reference(files, preferred) else {
        tracing::debug!("no timestamps found, skipping auto-alignment");
        return None;
    };
    tracing::debug!(
        reference = %reference.tag,
        earliest = %reference.earliest,
        "chose alignment reference"
    );

    for file in files {
        if file.tag == reference.tag || table.is_manual(&file.tag) {
            continue;
        }
        let Some(earliest) = file.earliest() else {
            continue;
        };
        let offset = round_to_hours(reference.earliest.signed_duration_since(earliest));
        table.set_auto(file.tag.clone(), offset);
        tracing::debug!(tag = %file.tag, hours = offset.num_hours(), "auto-aligned file");
    }

    Some(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tag(name: &str) -> SourceTag {
        SourceTag::new(name).unwrap()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 11, 14, 0, 0).unwrap()
    }

    /// A file whose first timestamp is `start`, with `count` lines one
    /// second apart and a trailing untimed line.
    fn file(name: &str, start: DateTime<Utc>, count: usize) -> SourceFile<ResolvedLine> {
        let tag = tag(name);
        let mut lines: Vec<ResolvedLine> = (0..count)
            .map(|i| ResolvedLine {
                text: format!("{name} {i}"),
                tag: tag.clone(),
                line_number: i + 1,
                timestamp: Some(start + TimeDelta::seconds(i64::try_from(i).unwrap())),
            })
            .collect();
        lines.push(ResolvedLine {
            text: "untimed".into(),
            tag: tag.clone(),
            line_number: count + 1,
            timestamp: None,
        });
        SourceFile::new(tag, lines)
    }

    fn untimed(name: &str) -> SourceFile<ResolvedLine> {
        file(name, base(), 0)
    }

    fn minutes(m: i64) -> TimeDelta {
        TimeDelta::minutes(m)
    }

    // ========== Rounding ==========

    #[test]
    fn rounds_to_nearest_hour() {
        assert_eq!(round_to_hours(minutes(204)), TimeDelta::hours(3)); // 3.4h
        assert_eq!(round_to_hours(minutes(216)), TimeDelta::hours(4)); // 3.6h
        assert_eq!(round_to_hours(minutes(-204)), TimeDelta::hours(-3));
        assert_eq!(round_to_hours(minutes(-216)), TimeDelta::hours(-4));
        assert_eq!(round_to_hours(minutes(20)), TimeDelta::zero());
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_to_hours(minutes(150)), TimeDelta::hours(3)); // 2.5h
        assert_eq!(round_to_hours(minutes(-150)), TimeDelta::hours(-2));
        assert_eq!(round_to_hours(minutes(30)), TimeDelta::hours(1));
    }

    #[test]
    fn rounding_sees_below_a_millisecond() {
        let just_past_half = minutes(150) + TimeDelta::microseconds(400);
        assert_eq!(round_to_hours(-just_past_half), TimeDelta::hours(-3));
        assert_eq!(round_to_hours(just_past_half), TimeDelta::hours(3));
        let just_short = minutes(150) - TimeDelta::nanoseconds(1);
        assert_eq!(round_to_hours(just_short), TimeDelta::hours(2));
        assert_eq!(round_to_hours(-just_short), TimeDelta::hours(-2));
    }

    // ========== Manual hours ==========

    #[test]
    fn manual_hours_allow_fractions() {
        assert_eq!(hours_to_delta(5.5).unwrap(), minutes(330));
        assert_eq!(hours_to_delta(-0.25).unwrap(), minutes(-15));
    }

    #[test]
    fn manual_hours_reject_non_finite() {
        assert!(hours_to_delta(f64::NAN).is_err());
        assert!(hours_to_delta(f64::INFINITY).is_err());
        assert!(hours_to_delta(2e6).is_err());
    }

    #[test]
    fn manual_entries_are_not_overwritten() {
        let mut table = OffsetTable::new();
        table.set_manual(tag("e825"), TimeDelta::hours(5));
        assert!(!table.set_auto(tag("e825"), TimeDelta::hours(1)));
        assert_eq!(table.get(&tag("e825")), TimeDelta::hours(5));
        assert!(table.is_manual(&tag("e825")));
        assert_eq!(table.get(&tag("unknown")), TimeDelta::zero());
    }

    // ========== Reference selection ==========

    #[test]
    fn daemon_preferred_as_reference() {
        let files = vec![
            file("daemon", base(), 3),
            file("e825", base() - minutes(60), 50),
        ];
        let reference = choose_reference(&files, DEFAULT_REFERENCE_TAG).unwrap();
        assert_eq!(reference.tag, "daemon");
        assert_eq!(reference.earliest, base());
    }

    #[test]
    fn untimed_daemon_falls_back_to_most_timestamps() {
        let files = vec![
            untimed("daemon"),
            file("e825", base(), 10),
            file("e830", base() + minutes(5), 40),
        ];
        let reference = choose_reference(&files, DEFAULT_REFERENCE_TAG).unwrap();
        assert_eq!(reference.tag, "e830");
        assert_eq!(reference.earliest, base() + minutes(5));
    }

    #[test]
    fn equal_counts_keep_first_file() {
        let files = vec![file("a", base(), 5), file("b", base(), 5)];
        let reference = choose_reference(&files, DEFAULT_REFERENCE_TAG).unwrap();
        assert_eq!(reference.tag, "a");
    }

    // ========== Alignment ==========

    #[test]
    fn aligns_file_behind_reference() {
        let files = vec![
            file("a", base(), 100),
            file("b", base() - minutes(204), 10),
            file("c", base() - minutes(216), 10),
            file("d", base() - minutes(150), 10),
            file("e", base() + minutes(300), 10),
        ];
        let mut table = OffsetTable::new();
        let reference = auto_align(&files, &mut table, DEFAULT_REFERENCE_TAG).unwrap();

        assert_eq!(reference.tag, "a");
        assert_eq!(table.get(&tag("b")), TimeDelta::hours(3));
        assert_eq!(table.get(&tag("c")), TimeDelta::hours(4));
        assert_eq!(table.get(&tag("d")), TimeDelta::hours(3));
        assert_eq!(table.get(&tag("e")), TimeDelta::hours(-5));
        assert_eq!(table.source(&tag("b")), Some(OffsetSource::Auto));
        // The reference itself gets no entry.
        assert_eq!(table.source(&tag("a")), None);
    }

    #[test]
    fn manual_offsets_skip_auto_alignment() {
        let files = vec![file("a", base(), 100), file("b", base() - minutes(204), 10)];
        let mut table = OffsetTable::new();
        table.set_manual_hours(tag("b"), 0.5).unwrap();

        auto_align(&files, &mut table, DEFAULT_REFERENCE_TAG);
        assert_eq!(table.get(&tag("b")), minutes(30));
        assert!(table.is_manual(&tag("b")));
    }

    #[test]
    fn untimed_files_get_no_offset() {
        let files = vec![file("a", base(), 3), untimed("b")];
        let mut table = OffsetTable::new();
        auto_align(&files, &mut table, DEFAULT_REFERENCE_TAG);
        assert_eq!(table.source(&tag("b")), None);
    }

    #[test]
    fn no_timestamps_anywhere_aligns_nothing() {
        let files = vec![untimed("a"), untimed("daemon")];
        let mut table = OffsetTable::new();
        assert!(auto_align(&files, &mut table, DEFAULT_REFERENCE_TAG).is_none());
        assert!(table.is_empty());
    }
}
