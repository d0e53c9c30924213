//! Uptime-to-absolute resolution.
//!
//! Lines stamped only with process uptime are placed on the calendar by
//! borrowing time from a nearby line that carries an absolute timestamp (an
//! anchor). When the anchor itself sits next to an uptime value, the two
//! uptimes are differenced and the result is exact; otherwise the anchor's
//! instant is used as is.
//!
//! # Algorithm Summary
//!
//! 1. Every absolute line is an anchor. Pair it with the nearest uptime line
//!    within `pairing` lines, looking backward first, then forward.
//! 2. For each uptime line, pick the nearest forward anchor if it is within
//!    `preference` lines, else the nearest backward anchor within
//!    `preference`, else whichever anchor is nearest overall.
//! 3. Resolved instant = `anchor + (uptime - anchor_uptime)`, or just
//!    `anchor` when the anchor has no paired uptime.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::line::{ParsedLine, ResolvedLine};
use crate::timestamp::Uptime;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no absolute timestamp to anchor {uptime_lines} uptime line(s)")]
    NoAnchor { uptime_lines: usize },
}

/// Neighborhood sizes used when searching for anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorWindow {
    /// How far (in lines) an anchor looks for an uptime to pair with.
    /// Default: 5.
    pub pairing: usize,

    /// How far a forward or backward anchor may be before falling back to
    /// the nearest anchor in either direction.
    /// Default: 10.
    pub preference: usize,
}

impl Default for AnchorWindow {
    fn default() -> Self {
        Self {
            pairing: 5,
            preference: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    index: usize,
    instant: DateTime<Utc>,
    uptime: Option<Uptime>,
}

impl Anchor {
    /// Places `uptime` on the calendar relative to this anchor.
    fn project(&self, uptime: Uptime) -> Option<DateTime<Utc>> {
        match self.uptime {
            Some(paired) => self.instant.checked_add_signed(uptime.since(paired)?),
            None => Some(self.instant),
        }
    }
}

/// Resolves every uptime-only line in one file's lines.
///
/// Lines must be in file order. Returns [`ResolveError::NoAnchor`] when the
/// file has uptime lines but not a single absolute timestamp; callers then
/// keep those lines unresolved.
pub fn resolve_uptimes(
    lines: &[ParsedLine],
    window: &AnchorWindow,
) -> Result<Vec<ResolvedLine>, ResolveError> {
    let uptime_lines = lines.iter().filter(|l| l.uptime().is_some()).count();
    if uptime_lines == 0 {
        return Ok(lines.iter().map(ResolvedLine::unresolved).collect());
    }

    let anchors = collect_anchors(lines, window.pairing);
    if anchors.is_empty() {
        return Err(ResolveError::NoAnchor { uptime_lines });
    }

    let mut resolved_count = 0usize;
    let resolved = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let Some(uptime) = line.uptime() else {
                return ResolvedLine::unresolved(line);
            };
            let instant = select_anchor(&anchors, index, window.preference)
                .and_then(|anchor| anchor.project(uptime));
            if instant.is_some() {
                resolved_count += 1;
            }
            ResolvedLine::with_timestamp(line, instant)
        })
        .collect();

    tracing::debug!(
        tag = %lines[0].tag,
        anchors = anchors.len(),
        uptime_lines,
        resolved = resolved_count,
        "resolved uptime timestamps"
    );

    Ok(resolved)
}

fn collect_anchors(lines: &[ParsedLine], pairing: usize) -> Vec<Anchor> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let instant = line.absolute()?;
            Some(Anchor {
                index,
                instant,
                uptime: paired_uptime(lines, index, pairing),
            })
        })
        .collect()
}

/// Nearest uptime within `pairing` lines of `index`, backward first.
fn paired_uptime(lines: &[ParsedLine], index: usize, pairing: usize) -> Option<Uptime> {
    let backward = lines[index.saturating_sub(pairing)..index].iter().rev();
    let forward = lines.iter().skip(index + 1).take(pairing);
    backward.chain(forward).find_map(ParsedLine::uptime)
}

fn select_anchor(anchors: &[Anchor], index: usize, preference: usize) -> Option<&Anchor> {
    let mut nearest: Option<(usize, &Anchor)> = None;
    let mut forward: Option<(usize, &Anchor)> = None;
    let mut backward: Option<(usize, &Anchor)> = None;

    for anchor in anchors {
        let distance = anchor.index.abs_diff(index);
        if nearest.is_none_or(|(d, _)| distance < d) {
            nearest = Some((distance, anchor));
        }
        if anchor.index > index && forward.is_none_or(|(d, _)| distance < d) {
            forward = Some((distance, anchor));
        }
        if anchor.index < index && backward.is_none_or(|(d, _)| distance < d) {
            backward = Some((distance, anchor));
        }
    }

    forward
        .filter(|(distance, _)| *distance <= preference)
        .or_else(|| backward.filter(|(distance, _)| *distance <= preference))
        .or(nearest)
        .map(|(_, anchor)| anchor)
}
