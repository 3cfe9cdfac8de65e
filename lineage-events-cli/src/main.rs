//! Lineage Events CLI Application
//!
//! Command-line interface for the lineage event selector.
//! It uses the lineage-events library and adds:
//! - TOML configuration with command-line overrides
//! - Parallel processing of several positions (one graph file each)
//! - Report generation (TXT/JSON)

use anyhow::{bail, Context, Result};
use clap::Parser;
use lineage_events::{EventSelector, TransitionSpec};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

mod config;
mod positions;
mod report;

use config::{AppConfig, OutputFormat};

/// Lineage Events - Select label-transition events from tracking graphs
#[derive(Parser, Debug)]
#[command(name = "lineage-events")]
#[command(about = "Select label-transition events from cell tracking graphs", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a tracking graph JSON file (can be repeated, one per position)
    #[arg(short, long, value_name = "FILE")]
    graph: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for reports (default: TXT report on stdout)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Label transitions, e.g. "(0,1),(1,2)"
    #[arg(short, long, value_name = "PAIRS")]
    transitions: Option<String>,

    /// Frames before the transition (-1 = unbounded)
    #[arg(long, value_name = "FRAMES", allow_negative_numbers = true)]
    backward_range: Option<i64>,

    /// Frames after the transition (-1 = unbounded)
    #[arg(long, value_name = "FRAMES", allow_negative_numbers = true)]
    forward_range: Option<i64>,

    /// Maximum out-degree tolerated in the forward window (2 follows divisions)
    #[arg(long, value_name = "DEGREE")]
    max_out_degree: Option<usize>,

    /// Stop starting new positions after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Lineage Events CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using selection library v{}", lineage_events::VERSION);

    let config = build_config(&args)?;
    config.validate()?;

    let selector = EventSelector::new(config.selection.clone())
        .context("Failed to set up event selector")?;
    log::info!(
        "Selecting {} transition(s) in {} position(s)",
        selector.transitions().len(),
        config.input.graphs.len()
    );

    let abort = AtomicBool::new(false);
    let outcomes = positions::run_positions(
        &config.input.graphs,
        &selector,
        &abort,
        config.input.fail_fast,
    );

    let output_dir = config.output.output_dir.as_deref();
    let mut failed = outcomes.iter().filter(|o| o.is_failed()).count();
    match config.output.format {
        OutputFormat::Txt => report::write_txt_report(&outcomes, output_dir)?,
        OutputFormat::Json => {
            let dir = output_dir.context("JSON output needs an output directory")?;
            let (written, export_failures) = report::write_json_reports(&outcomes, dir)?;
            log::info!("Wrote {} export file(s) to {:?}", written.len(), dir);
            failed += export_failures;
        }
    }

    if failed > 0 {
        bail!("{} of {} position(s) failed", failed, outcomes.len());
    }
    Ok(())
}

/// Load the config file (if any) and apply command-line overrides
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    config.input.graphs.extend(args.graph.iter().cloned());
    config.input.fail_fast |= args.fail_fast;
    if let Some(dir) = &args.output_dir {
        config.output.output_dir = Some(dir.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }

    let selection = &mut config.selection;
    if let Some(text) = &args.transitions {
        selection.transitions = TransitionSpec::Text(text.clone());
    }
    if let Some(range) = args.backward_range {
        selection.backward_range = range;
    }
    if let Some(range) = args.forward_range {
        selection.forward_range = range;
    }
    if let Some(degree) = args.max_out_degree {
        selection.max_out_degree = degree;
    }

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_overrides() {
        let args = Args::parse_from([
            "lineage-events",
            "--graph",
            "a.json",
            "--graph",
            "b.json",
            "--transitions",
            "(0,1)",
            "--backward-range",
            "-1",
            "--forward-range",
            "6",
            "--max-out-degree",
            "2",
            "--format",
            "json",
            "--output-dir",
            "out",
        ]);

        let config = build_config(&args).unwrap();
        assert_eq!(config.input.graphs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(config.selection.backward_range, -1);
        assert_eq!(config.selection.forward_range, 6);
        assert_eq!(config.selection.max_out_degree, 2);
        assert_eq!(config.selection.max_length(), None);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_transitions_fail_validation() {
        let args = Args::parse_from(["lineage-events", "--graph", "a.json"]);
        let config = build_config(&args).unwrap();
        assert!(config.validate().is_err());
    }
}
