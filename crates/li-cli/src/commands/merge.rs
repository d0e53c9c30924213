//! Merge command: prints the interleaved timeline.

use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use li_core::{ResolvedLine, format_line};

use super::util;
use crate::{Config, SourceArgs};

/// Runs the merge command, writing to `output` or stdout.
pub fn run(config: &Config, args: &SourceArgs, output: Option<&Path>) -> Result<()> {
    let result = util::load(config, args)?;
    for tag in &result.unresolved {
        eprintln!("Warning: no absolute anchor in '{tag}'; uptime lines left untimed");
    }

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_lines(&mut writer, &result.lines)
                .and_then(|()| writer.flush())
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(lines = result.lines.len(), path = %path.display(), "wrote merged log");
        }
        None => {
            let stdout = stdout();
            let mut writer = BufWriter::new(stdout.lock());
            // Handle broken pipe gracefully (e.g., when piped to `head`)
            if write_lines(&mut writer, &result.lines)
                .and_then(|()| writer.flush())
                .is_err()
            {
                tracing::debug!("stdout closed early");
            }
        }
    }
    Ok(())
}

/// Writes one formatted line per merged record.
pub fn write_lines<W: Write>(writer: &mut W, lines: &[ResolvedLine]) -> std::io::Result<()> {
    for line in lines {
        writeln!(writer, "{}", format_line(line))?;
    }
    Ok(())
}
