//! Implementation of the `li export` command.
//!
//! Runs the configured metric patterns over the merged timeline and writes the
//! resulting series as CSV (one row per distinct instant) and/or as JSON ready
//! for plotting.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write, stdout};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use li_core::{MetricExtractor, MetricPoint, MetricSeries, PatternConfig};

use super::util;
use crate::{Config, ExportConfig, SourceArgs};

/// One extracted series together with the pattern that produced it.
#[derive(Debug)]
pub struct NamedSeries<'a> {
    pub name: String,
    pub pattern: &'a PatternConfig,
    pub points: Vec<MetricPoint>,
}

#[derive(Debug, Serialize)]
struct PlotData<'a> {
    title: &'a str,
    xaxis_label: &'a str,
    yaxis_label: &'a str,
    start_time: String,
    series: Vec<PlotSeries<'a>>,
}

#[derive(Debug, Serialize)]
struct PlotSeries<'a> {
    name: &'a str,
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_style: Option<&'a str>,
    mode: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    step: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    yaxis_label: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    state_mapping: &'a BTreeMap<String, f64>,
}

/// Run the export command. Without `--csv` or `--json`, CSV goes to stdout.
pub fn run(
    config: &Config,
    args: &SourceArgs,
    csv_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<()> {
    if config.patterns.is_empty() {
        bail!("no metric patterns configured; add [[patterns]] entries to the config file");
    }
    let extractor =
        MetricExtractor::new(&config.patterns).context("failed to compile metric patterns")?;

    let result = util::load(config, args)?;
    let metrics = extractor.extract(&result.lines);
    let series = order_series(&config.patterns, metrics);
    let Some(start) = earliest(&series) else {
        bail!("no metric points found in {} lines", result.lines.len());
    };

    if let Some(path) = csv_path {
        write_file(path, |w| write_csv(w, &series, start))?;
        eprintln!("CSV data exported to: {}", path.display());
    }
    if let Some(path) = json_path {
        write_file(path, |w| write_json(w, &series, start, &config.export))?;
        eprintln!("JSON data exported to: {}", path.display());
    }
    if csv_path.is_none() && json_path.is_none() {
        let stdout = stdout();
        let mut writer = BufWriter::new(stdout.lock());
        // Handle broken pipe gracefully (e.g., when piped to `head`)
        if write_csv(&mut writer, &series, start)
            .and_then(|()| writer.flush())
            .is_err()
        {
            tracing::debug!("stdout closed early");
        }
    }

    tracing::info!(series = series.len(), "exported metrics");
    Ok(())
}

fn write_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Orders series by pattern, then by name for device-split series.
///
/// A series belongs to the first pattern whose name equals it or prefixes it
/// followed by a space (the device suffix).
pub fn order_series(patterns: &[PatternConfig], mut metrics: MetricSeries) -> Vec<NamedSeries<'_>> {
    let mut ordered = Vec::new();
    for pattern in patterns {
        let prefix = format!("{} ", pattern.name);
        let names: Vec<String> = metrics
            .keys()
            .filter(|name| name.as_str() == pattern.name || name.starts_with(&prefix))
            .cloned()
            .collect();
        for name in names {
            // Points arrive in merged, chronological order.
            if let Some(points) = metrics.remove(&name) {
                ordered.push(NamedSeries {
                    name,
                    pattern,
                    points,
                });
            }
        }
    }
    ordered
}

fn earliest(series: &[NamedSeries<'_>]) -> Option<DateTime<Utc>> {
    series
        .iter()
        .flat_map(|s| s.points.first())
        .map(|p| p.time)
        .min()
}

fn latest(series: &[NamedSeries<'_>]) -> Option<DateTime<Utc>> {
    series
        .iter()
        .flat_map(|s| s.points.last())
        .map(|p| p.time)
        .max()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "microsecond offsets over a capture fit comfortably in f64"
)]
fn seconds_since(time: DateTime<Utc>, start: DateTime<Utc>) -> f64 {
    (time - start).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
}

/// Writes one row per distinct instant; a series without a point at that
/// instant leaves its cell empty.
pub fn write_csv<W: Write>(
    writer: &mut W,
    series: &[NamedSeries<'_>],
    start: DateTime<Utc>,
) -> io::Result<()> {
    let columns: Vec<BTreeMap<DateTime<Utc>, f64>> = series
        .iter()
        .map(|s| {
            let mut column = BTreeMap::new();
            for point in &s.points {
                column.entry(point.time).or_insert(point.value);
            }
            column
        })
        .collect();
    let times: BTreeSet<DateTime<Utc>> = columns.iter().flat_map(|c| c.keys().copied()).collect();

    write!(writer, "Time,TimeOffsetSeconds")?;
    for s in series {
        write!(writer, ",{}", csv_field(&s.name))?;
    }
    writeln!(writer)?;

    for time in times {
        write!(
            writer,
            "{},{:.6}",
            time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            seconds_since(time, start)
        )?;
        for column in &columns {
            match column.get(&time) {
                Some(value) => write!(writer, ",{value:.6}")?,
                None => write!(writer, ",")?,
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Writes the plot description as pretty-printed JSON.
pub fn write_json<W: Write>(
    writer: &mut W,
    series: &[NamedSeries<'_>],
    start: DateTime<Utc>,
    labels: &ExportConfig,
) -> io::Result<()> {
    let end = latest(series).unwrap_or(start);
    let data = PlotData {
        title: &labels.title,
        xaxis_label: &labels.xaxis_label,
        yaxis_label: &labels.yaxis_label,
        start_time: start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        series: series.iter().map(|s| plot_series(s, start, end)).collect(),
    };
    serde_json::to_writer_pretty(&mut *writer, &data)?;
    writeln!(writer)
}

fn plot_series<'a>(
    series: &'a NamedSeries<'_>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> PlotSeries<'a> {
    let pattern = series.pattern;
    let (x, y) = match series.points.as_slice() {
        // A lone step point is held until the end of the capture.
        [only] if pattern.step => (
            vec![seconds_since(only.time, start), seconds_since(end, start)],
            vec![only.value, only.value],
        ),
        points => points
            .iter()
            .map(|p| (seconds_since(p.time, start), p.value))
            .unzip(),
    };

    PlotSeries {
        name: &series.name,
        x,
        y,
        color: non_empty(pattern.color.as_deref()),
        marker: non_empty(pattern.marker.as_deref()),
        line_style: non_empty(pattern.line_style.as_deref()),
        mode: plot_mode(pattern),
        step: pattern.step,
        yaxis_label: non_empty(pattern.yaxis_label.as_deref()),
        state_mapping: &pattern.state_mapping,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn plot_mode(pattern: &PatternConfig) -> &'static str {
    match (
        non_empty(pattern.line_style.as_deref()),
        non_empty(pattern.marker.as_deref()),
    ) {
        (Some("none"), _) | (None, Some(_)) => "markers",
        (_, None) => "lines",
        (Some(_), Some(_)) => "lines+markers",
    }
}
