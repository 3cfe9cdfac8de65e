//! Per-position processing
//!
//! Every position (field of view) has its own tracking graph and gets its own
//! engine run. Positions run in parallel; a failure is confined to its
//! position. The abort flag is only checked before a position starts.

use anyhow::{Context, Result};
use lineage_events::{EventSelector, LineageGraph, Selection};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of one position
#[derive(Debug)]
pub struct PositionOutcome {
    pub name: String,
    pub path: PathBuf,
    pub result: PositionResult,
}

#[derive(Debug)]
pub enum PositionResult {
    Completed(Selection),
    Failed(String),
    /// Not started because the run was aborted
    Skipped,
}

impl PositionOutcome {
    pub fn selection(&self) -> Option<&Selection> {
        match &self.result {
            PositionResult::Completed(selection) => Some(selection),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.result, PositionResult::Failed(_))
    }
}

/// Position name derived from the graph file name
pub fn position_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Run the engine on every graph file, results in input order
pub fn run_positions(
    graphs: &[PathBuf],
    selector: &EventSelector,
    abort: &AtomicBool,
    fail_fast: bool,
) -> Vec<PositionOutcome> {
    graphs
        .par_iter()
        .map(|path| {
            let name = position_name(path);
            let result = if abort.load(Ordering::SeqCst) {
                log::warn!("Position {} skipped: run aborted", name);
                PositionResult::Skipped
            } else {
                match run_position(path, selector) {
                    Ok(selection) => {
                        log::info!("Position {}: {} events", name, selection.registry.len());
                        PositionResult::Completed(selection)
                    }
                    Err(e) => {
                        log::error!("Position {} failed: {:#}", name, e);
                        if fail_fast {
                            abort.store(true, Ordering::SeqCst);
                        }
                        PositionResult::Failed(format!("{:#}", e))
                    }
                }
            };
            PositionOutcome {
                name,
                path: path.clone(),
                result,
            }
        })
        .collect()
}

/// Load one graph and select its events
pub fn run_position(path: &Path, selector: &EventSelector) -> Result<Selection> {
    let graph = LineageGraph::from_json_file(path)
        .with_context(|| format!("Failed to load tracking graph: {:?}", path))?;
    log::debug!(
        "Position {}: {} nodes, {} edges",
        position_name(path),
        graph.node_count(),
        graph.edge_count()
    );

    let selection = selector
        .select(&graph)
        .with_context(|| format!("Event selection failed for {:?}", path))?;
    Ok(selection)
}
