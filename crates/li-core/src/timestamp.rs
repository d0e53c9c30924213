//! Timestamp conventions found in clock-synchronization logs.
//!
//! Every parser here is total: malformed or partial input yields `None`,
//! never an error, so a bad line can't stop the rest of a file from parsing.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;

/// glog style: `I0111 14:03:55.976211`.
static ABSOLUTE_COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[IEWD]([0-9]{2})([0-9]{2})\s+([0-9]{2}):([0-9]{2}):([0-9]{2})\.([0-9]{6})")
        .unwrap()
});

/// `2026-01-11 09:04:29` at line start.
static FULL_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})\s+([0-9]{2}):([0-9]{2}):([0-9]{2})").unwrap()
});

/// `T-BC[1768140305]:`
static EPOCH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([0-9]+)\]:").unwrap());

/// `ptp4l[275313.748]:`
static UPTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([0-9]+)\.([0-9]+)\]:").unwrap());

/// `"timestamp":"2026-01-12T11:36:14.788270397Z"`
static JSON_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""timestamp"\s*:\s*"([0-9]{4})-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})\.([0-9]+)Z""#,
    )
    .unwrap()
});

/// A timestamp extracted from a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// A calendar-accurate instant.
    Absolute(DateTime<Utc>),
    /// Time since an unknown process start. Must be resolved against an
    /// absolute anchor before it can be ordered against anything else.
    Uptime(Uptime),
}

impl Timestamp {
    /// Returns the instant if this timestamp is absolute.
    pub const fn absolute(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Absolute(instant) => Some(*instant),
            Self::Uptime(_) => None,
        }
    }

    /// Returns the uptime if this timestamp is relative.
    pub const fn uptime(&self) -> Option<Uptime> {
        match self {
            Self::Uptime(uptime) => Some(*uptime),
            Self::Absolute(_) => None,
        }
    }
}

/// Monotonic process uptime, kept exact to the nanosecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uptime(TimeDelta);

impl Uptime {
    /// Builds an uptime from whole seconds and a nanosecond remainder.
    pub const fn new(seconds: i64, nanos: u32) -> Option<Self> {
        match TimeDelta::new(seconds, nanos) {
            Some(delta) => Some(Self(delta)),
            None => None,
        }
    }

    /// Signed distance from `earlier` to `self`.
    pub fn since(self, earlier: Self) -> Option<TimeDelta> {
        self.0.checked_sub(&earlier.0)
    }

    pub const fn as_delta(self) -> TimeDelta {
        self.0
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0.num_seconds(),
            self.0.subsec_nanos() / 1_000
        )
    }
}

/// Knobs that change how timestamps are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Year assumed for formats that omit it (the glog `MMDD` form).
    pub reference_year: i32,
    /// Also recognize `"timestamp":"...Z"` JSON fields, after all other formats.
    pub json_timestamps: bool,
}

impl ParseOptions {
    pub const fn new(reference_year: i32) -> Self {
        Self {
            reference_year,
            json_timestamps: false,
        }
    }

    #[must_use]
    pub const fn with_json_timestamps(mut self, enabled: bool) -> Self {
        self.json_timestamps = enabled;
        self
    }
}

/// Parses the glog form `[IEWD]MMDD HH:MM:SS.ffffff` at line start.
///
/// The text carries no year, so `reference_year` supplies it.
pub fn parse_absolute_compact(line: &str, reference_year: i32) -> Option<DateTime<Utc>> {
    let caps = ABSOLUTE_COMPACT_RE.captures(line)?;
    let month = caps[1].parse().ok()?;
    let day = caps[2].parse().ok()?;
    let hour = caps[3].parse().ok()?;
    let minute = caps[4].parse().ok()?;
    let second = caps[5].parse().ok()?;
    let micro = caps[6].parse().ok()?;

    NaiveDate::from_ymd_opt(reference_year, month, day)?
        .and_hms_micro_opt(hour, minute, second, micro)
        .map(|dt| dt.and_utc())
}

/// Parses `YYYY-MM-DD HH:MM:SS` at line start.
pub fn parse_full_datetime(line: &str) -> Option<DateTime<Utc>> {
    let caps = FULL_DATETIME_RE.captures(line)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    let hour = caps[4].parse().ok()?;
    let minute = caps[5].parse().ok()?;
    let second = caps[6].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|dt| dt.and_utc())
}

/// Parses Unix epoch seconds written as `[1768140305]:`.
pub fn parse_epoch(line: &str) -> Option<DateTime<Utc>> {
    let caps = EPOCH_RE.captures(line)?;
    let seconds: i64 = caps[1].parse().ok()?;
    DateTime::from_timestamp(seconds, 0)
}

/// Parses uptime written as `[275313.748]:`.
///
/// The digits after the point are a decimal fraction of a second.
pub fn parse_uptime(line: &str) -> Option<Uptime> {
    let caps = UPTIME_RE.captures(line)?;
    let seconds: i64 = caps[1].parse().ok()?;
    let nanos = fraction_to_nanos(&caps[2])?;
    Uptime::new(seconds, nanos)
}

/// Parses a JSON `"timestamp":"YYYY-MM-DDTHH:MM:SS.fffZ"` field anywhere in the line.
pub fn parse_json_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = JSON_TIMESTAMP_RE.captures(line)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    let hour = caps[4].parse().ok()?;
    let minute = caps[5].parse().ok()?;
    let second = caps[6].parse().ok()?;
    let nanos = fraction_to_nanos(&caps[7])?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_nano_opt(hour, minute, second, nanos)
        .map(|dt| dt.and_utc())
}

/// Formats the time of day as `HH:MM:SS.ffffff`.
pub fn format_clock(instant: DateTime<Utc>) -> String {
    instant.format("%H:%M:%S%.6f").to_string()
}

/// Interprets fraction digits as nanoseconds, truncating past nine digits.
fn fraction_to_nanos(digits: &str) -> Option<u32> {
    let digits = digits.get(..9).unwrap_or(digits);
    let value: u32 = digits.parse().ok()?;
    let scale = 10u32.pow(u32::try_from(9 - digits.len()).ok()?);
    value.checked_mul(scale)
}
