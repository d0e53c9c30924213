//! Shared utilities for CLI commands.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::Datelike;
use li_core::{AnchorWindow, Interleaved, Interleaver, ParseOptions};

use crate::{Config, SourceArgs};

/// Parses a `tag:hours` offset. Splits on the last colon so tags may contain one.
pub fn parse_offset(s: &str) -> Option<(String, f64)> {
    let (tag, hours) = s.trim().rsplit_once(':')?;
    let tag = tag.trim();
    let hours: f64 = hours.trim().parse().ok()?;
    if tag.is_empty() || !hours.is_finite() {
        return None;
    }
    Some((tag.to_string(), hours))
}

/// Builds the interleaver from config, with command-line flags taking precedence.
pub fn build_interleaver(config: &Config, args: &SourceArgs) -> anyhow::Result<Interleaver> {
    let logs_dir = args.logs.clone().unwrap_or_else(|| config.logs_dir.clone());
    let year = args
        .year
        .or(config.reference_year)
        .unwrap_or_else(|| chrono::Local::now().year());

    let options = ParseOptions::new(year).with_json_timestamps(config.json_timestamps);

    let mut offsets: BTreeMap<String, f64> = config.offsets.clone();
    for raw in &args.offsets {
        match parse_offset(raw) {
            Some((tag, hours)) => {
                offsets.insert(tag, hours);
            }
            None => eprintln!("Warning: ignoring invalid offset '{raw}' (expected TAG:HOURS)"),
        }
    }

    let mut interleaver = Interleaver::new(logs_dir, options)
        .auto_align(config.auto_align && !args.no_auto_align)
        .anchor_window(AnchorWindow {
            pairing: config.anchor_window,
            preference: config.preference_window,
        })
        .reference_tag(config.reference_tag.clone())
        .extension(config.extension_filter());

    for (tag, hours) in &offsets {
        interleaver = interleaver
            .with_offset(tag, *hours)
            .with_context(|| format!("invalid offset {hours}h for '{tag}'"))?;
    }

    tracing::debug!(
        dir = %interleaver.log_dir().display(),
        year,
        manual_offsets = offsets.len(),
        "configured interleaver"
    );
    Ok(interleaver)
}

/// Builds and runs the interleaver.
pub fn load(config: &Config, args: &SourceArgs) -> anyhow::Result<Interleaved> {
    let interleaver = build_interleaver(config, args)?;
    interleaver.run().with_context(|| {
        format!(
            "failed to interleave logs in {}",
            interleaver.log_dir().display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_offset_accepts_fractional_and_negative_hours() {
        assert_eq!(parse_offset("e825:5"), Some(("e825".to_string(), 5.0)));
        assert_eq!(parse_offset("daemon:-1.5"), Some(("daemon".to_string(), -1.5)));
        assert_eq!(parse_offset(" tbc : 0.25 "), Some(("tbc".to_string(), 0.25)));
    }

    #[test]
    fn parse_offset_splits_on_last_colon() {
        assert_eq!(parse_offset("host:a:2"), Some(("host:a".to_string(), 2.0)));
    }

    #[test]
    fn parse_offset_rejects_malformed_entries() {
        assert_eq!(parse_offset("e825"), None);
        assert_eq!(parse_offset(":5"), None);
        assert_eq!(parse_offset("e825:five"), None);
        assert_eq!(parse_offset("e825:inf"), None);
        assert_eq!(parse_offset(""), None);
    }

    #[test]
    fn command_line_offsets_override_config() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("daemon.txt"),
            "I0111 14:00:00.000000 daemon: up\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("e825.txt"),
            "2026-01-11 09:00:00 ts2phc: up\n",
        )
        .unwrap();

        let config = Config {
            offsets: BTreeMap::from([("e825".to_string(), 1.0)]),
            ..Config::default()
        };
        let args = SourceArgs {
            logs: Some(temp.path().to_path_buf()),
            offsets: vec!["e825:4".to_string(), "bogus".to_string()],
            year: Some(2026),
            ..SourceArgs::default()
        };

        let result = load(&config, &args).unwrap();
        let e825 = result.lines.iter().find(|l| l.tag == "e825").unwrap();
        assert_eq!(
            li_core::format_clock(e825.timestamp.unwrap()),
            "13:00:00.000000"
        );
        assert!(result.offsets.is_manual(&e825.tag));
    }

    #[test]
    fn no_auto_align_flag_disables_alignment() {
        let temp = tempfile::tempdir().unwrap();
        let args = SourceArgs {
            logs: Some(temp.path().to_path_buf()),
            no_auto_align: true,
            year: Some(2026),
            ..SourceArgs::default()
        };
        let result = load(&Config::default(), &args).unwrap();
        assert!(result.lines.is_empty());
        assert!(result.reference.is_none());
    }

    #[test]
    fn missing_directory_reports_path() {
        let temp = tempfile::tempdir().unwrap();
        let args = SourceArgs {
            logs: Some(temp.path().join("missing")),
            ..SourceArgs::default()
        };
        let err = load(&Config::default(), &args).unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
    }
}
