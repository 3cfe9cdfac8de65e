//! Report generation
//!
//! TXT: one human-readable summary for all positions.
//! JSON: one export document per position, for downstream statistics and
//! gallery tools.

use crate::positions::{PositionOutcome, PositionResult};
use anyhow::{Context, Result};
use chrono::Local;
use lineage_events::{ExportRecord, Selection, SelectionStats};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSON export document of one position
#[derive(Debug, Serialize)]
pub struct PositionExport<'a> {
    pub position: &'a str,
    pub generated: String,
    pub stats: &'a SelectionStats,
    pub events: Vec<ExportRecord>,
}

/// Write the TXT summary of all positions
pub fn write_txt<W: Write>(out: &mut W, outcomes: &[PositionOutcome]) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  Lineage Event Report")?;
    writeln!(out, "  Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "═══════════════════════════════════════════════")?;

    for outcome in outcomes {
        writeln!(out)?;
        writeln!(out, "Position {} ({})", outcome.name, outcome.path.display())?;
        writeln!(out, "───────────────────────────────────────────────")?;
        match &outcome.result {
            PositionResult::Completed(selection) => write_selection(out, selection)?,
            PositionResult::Failed(reason) => writeln!(out, "  FAILED: {}", reason)?,
            PositionResult::Skipped => writeln!(out, "  SKIPPED (run aborted)")?,
        }
    }

    let completed = outcomes.iter().filter(|o| o.selection().is_some()).count();
    let events: usize = outcomes
        .iter()
        .filter_map(|o| o.selection())
        .map(|s| s.registry.len())
        .sum();
    writeln!(out)?;
    writeln!(
        out,
        "Summary: {} of {} positions completed, {} events",
        completed,
        outcomes.len(),
        events
    )?;
    Ok(())
}

fn write_selection<W: Write>(out: &mut W, selection: &Selection) -> Result<()> {
    let stats = &selection.stats;
    writeln!(out, "  Roots:        {}", stats.roots)?;
    writeln!(out, "  Full tracks:  {}", stats.full_tracks)?;
    writeln!(out, "  Candidates:   {}", stats.candidates)?;
    writeln!(
        out,
        "  Rejected:     {} backward, {} forward, {} discarded",
        stats.backward_rejected, stats.forward_rejected, stats.discarded_windows
    )?;
    writeln!(out, "  Events:       {}", stats.events)?;
    for (transition, count) in &stats.per_transition {
        writeln!(out, "    {}: {}", transition, count)?;
    }

    for (root, event) in selection.registry.events() {
        let split = match (event.split_id, event.split_idx) {
            (Some(id), Some(idx)) => format!(" split {} @{}", id, idx),
            _ => String::new(),
        };
        writeln!(out, "  [{}] root {} event {}{}", event.key, root, event.event_id, split)?;
        for track in &event.tracks {
            let ids: Vec<String> = track.iter().map(ToString::to_string).collect();
            writeln!(out, "      {}", ids.join(" "))?;
        }
    }
    Ok(())
}

/// Write the TXT summary to `dir/events.txt`, or stdout without a directory
pub fn write_txt_report(outcomes: &[PositionOutcome], dir: Option<&Path>) -> Result<()> {
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
            let path = dir.join("events.txt");
            let file = File::create(&path)
                .with_context(|| format!("Failed to create report: {:?}", path))?;
            let mut writer = BufWriter::new(file);
            write_txt(&mut writer, outcomes)?;
            writer.flush()?;
            log::info!("Report written to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout();
            write_txt(&mut stdout.lock(), outcomes)?;
        }
    }
    Ok(())
}

/// Write one JSON export per completed position
///
/// An export failure (e.g. an unsupported three-way division) only loses that
/// position's file. Returns the written paths and the number of failures.
pub fn write_json_reports(
    outcomes: &[PositionOutcome],
    dir: &Path,
) -> Result<(Vec<PathBuf>, usize)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let mut written = Vec::new();
    let mut failures = 0;
    for outcome in outcomes {
        let Some(selection) = outcome.selection() else {
            continue;
        };
        match write_json_position(&outcome.name, selection, dir) {
            Ok(path) => written.push(path),
            Err(e) => {
                log::error!("Export of position {} failed: {:#}", outcome.name, e);
                failures += 1;
            }
        }
    }
    Ok((written, failures))
}

fn write_json_position(name: &str, selection: &Selection, dir: &Path) -> Result<PathBuf> {
    let export = PositionExport {
        position: name,
        generated: Local::now().to_rfc3339(),
        stats: &selection.stats,
        events: selection.registry.export()?,
    };

    let path = dir.join(format!("{}_events.json", name));
    let file = File::create(&path).with_context(|| format!("Failed to create export: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.flush()?;
    log::debug!("Exported {} event groups to {:?}", export.events.len(), path);
    Ok(path)
}
