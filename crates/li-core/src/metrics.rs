//! Regex-driven metric extraction from merged lines.
//!
//! Each configured pattern turns matching, timestamped lines into points of a
//! named series, e.g. the servo offset reported by `ptp4l` over time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::line::ResolvedLine;

/// Values in `[HALF_SECOND_NS, SECOND_NS)` are read as negative offsets.
const HALF_SECOND_NS: f64 = 500_000_000.0;
const SECOND_NS: f64 = 1_000_000_000.0;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("invalid regex for pattern '{name}'")]
    InvalidRegex { name: String, source: regex::Error },
}

/// One metric pattern, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Series name, e.g. "E830 offset".
    pub name: String,
    pub regex: String,
    /// Only lines from this source tag are considered.
    pub tag_filter: Option<String>,
    /// Capture group holding the value. 0 is the whole match.
    pub value_group: usize,
    /// Capture group holding a state such as `s2`. When it equals
    /// `value_group` the series plots states rather than numbers.
    pub state_group: Option<usize>,
    /// Capture group naming a device; its text is appended to the series name.
    pub device_group: Option<usize>,
    /// Numeric value for each state string.
    pub state_mapping: BTreeMap<String, f64>,
    /// Scale applied to every value (e.g. 0.001 for ps → ns).
    pub value_multiplier: Option<f64>,
    /// Treat the value as a nanosecond fraction; fractions of half a second
    /// or more wrap to negative offsets.
    pub convert_nanosecond_offset: bool,

    // Presentation hints, passed through to exports untouched.
    pub color: Option<String>,
    pub line_style: Option<String>,
    pub marker: Option<String>,
    pub step: bool,
    pub yaxis_label: Option<String>,
}

impl PatternConfig {
    const fn is_state_series(&self) -> bool {
        matches!(self.state_group, Some(g) if g > 0 && g == self.value_group)
    }
}

/// A single extracted value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub state: Option<String>,
}

/// Extracted points by series name, each series in line order.
pub type MetricSeries = BTreeMap<String, Vec<MetricPoint>>;

#[derive(Debug, Clone)]
struct CompiledPattern {
    config: PatternConfig,
    regex: Regex,
}

/// Applies a set of compiled patterns to merged lines.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    patterns: Vec<CompiledPattern>,
}

impl MetricExtractor {
    pub fn new(patterns: &[PatternConfig]) -> Result<Self, MetricError> {
        let patterns = patterns
            .iter()
            .map(|config| {
                let regex =
                    Regex::new(&config.regex).map_err(|source| MetricError::InvalidRegex {
                        name: config.name.clone(),
                        source,
                    })?;
                Ok(CompiledPattern {
                    config: config.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>, MetricError>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> impl Iterator<Item = &PatternConfig> {
        self.patterns.iter().map(|p| &p.config)
    }

    /// Extracts every series. Lines without a timestamp are skipped.
    pub fn extract(&self, lines: &[ResolvedLine]) -> MetricSeries {
        let mut series = MetricSeries::new();

        for line in lines {
            let Some(time) = line.timestamp else {
                continue;
            };
            for pattern in &self.patterns {
                if let Some((name, point)) = pattern.apply(line, time) {
                    series.entry(name).or_default().push(point);
                }
            }
        }

        tracing::debug!(
            series = series.len(),
            points = series.values().map(Vec::len).sum::<usize>(),
            "extracted metrics"
        );
        series
    }
}

impl CompiledPattern {
    fn apply(&self, line: &ResolvedLine, time: DateTime<Utc>) -> Option<(String, MetricPoint)> {
        let config = &self.config;
        if config
            .tag_filter
            .as_deref()
            .is_some_and(|tag| !tag.is_empty() && line.tag != tag)
        {
            return None;
        }

        let caps = self.regex.captures(&line.text)?;
        let raw = caps.get(config.value_group)?.as_str();
        let group = |index: Option<usize>| {
            index
                .filter(|&i| i > 0)
                .and_then(|i| caps.get(i))
                .map(|m| m.as_str().to_string())
        };
        let state = group(config.state_group);
        let device = group(config.device_group);

        let value = if config.is_state_series() {
            config
                .state_mapping
                .get(raw)
                .copied()
                .or_else(|| state_number(raw))?
        } else {
            parse_number(raw, config.convert_nanosecond_offset)?
        };
        let value = scale(wrap_nanoseconds(value, config), config.value_multiplier);

        let name = match device {
            Some(device) => format!("{} {device}", config.name),
            None => config.name.clone(),
        };
        Some((name, MetricPoint { time, value, state }))
    }
}

/// `s2` → 2.0
fn state_number(raw: &str) -> Option<f64> {
    raw.strip_prefix('s')
        .filter(|rest| !rest.is_empty())
        .and_then(|rest| rest.parse().ok())
}

fn parse_number(raw: &str, nanosecond_fraction: bool) -> Option<f64> {
    if !nanosecond_fraction {
        return raw.parse().ok();
    }
    // Fraction digits → exactly nine digits of nanoseconds.
    let mut digits: String = raw.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    digits.parse().ok()
}

fn wrap_nanoseconds(value: f64, config: &PatternConfig) -> f64 {
    if config.convert_nanosecond_offset && (HALF_SECOND_NS..SECOND_NS).contains(&value) {
        value - SECOND_NS
    } else {
        value
    }
}

fn scale(value: f64, multiplier: Option<f64>) -> f64 {
    match multiplier {
        Some(m) if m != 0.0 && (m - 1.0).abs() > f64::EPSILON => value * m,
        _ => value,
    }
}
