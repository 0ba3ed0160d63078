//! CRV aging analysis CLI

mod ingest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crv_pipeline::pipeline::{run, PipelineConfig};
use crv_pipeline::remap::TReadout;
use crv_pipeline::scan::InefficiencyScanner;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crvstat")]
#[command(about = "CRV aging analysis - layer-coincidence inefficiency from detector readout")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over JSON event files
    Run {
        /// Input event files (JSON arrays of event records)
        inputs: Vec<PathBuf>,

        /// Pipeline configuration (JSON). Built-in defaults if omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use double-ended T-module readout (sum mirror boards 4-5)
        #[arg(long)]
        double_ended: bool,

        /// Layer-sum trigger threshold override
        #[arg(long)]
        trigger_threshold: Option<f64>,

        /// Inefficiency scan start threshold override
        #[arg(long)]
        scan_start: Option<f64>,

        /// Inefficiency scan stop threshold override
        #[arg(long)]
        scan_stop: Option<f64>,

        /// Inefficiency scan step count override
        #[arg(long)]
        scan_steps: Option<usize>,
    },

    /// Print the threshold grid for a scan configuration
    Thresholds {
        /// Scan start threshold
        #[arg(long, default_value_t = crv_pipeline::scan::DEFAULT_SCAN_START)]
        start: f64,

        /// Scan stop threshold
        #[arg(long, default_value_t = crv_pipeline::scan::DEFAULT_SCAN_STOP)]
        stop: f64,

        /// Number of scan points
        #[arg(long, default_value_t = crv_pipeline::scan::DEFAULT_SCAN_STEPS)]
        steps: usize,
    },
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    inputs: &[PathBuf],
    config_path: Option<&PathBuf>,
    output: Option<&PathBuf>,
    double_ended: bool,
    trigger_threshold: Option<f64>,
    scan_start: Option<f64>,
    scan_stop: Option<f64>,
    scan_steps: Option<usize>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => serde_json::from_str::<PipelineConfig>(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if double_ended {
        config.t_readout = TReadout::DoubleEnded;
    }
    if let Some(t) = trigger_threshold {
        config.trigger_threshold = t;
    }
    if let Some(s) = scan_start {
        config.scan_start = s;
    }
    if let Some(s) = scan_stop {
        config.scan_stop = s;
    }
    if let Some(s) = scan_steps {
        config.scan_steps = s;
    }

    let table = ingest::load_files(inputs)?;
    let summary = run(table, &config)?;

    let json = serde_json::to_string_pretty(&summary)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            tracing::info!(path = %path.display(), "wrote pipeline summary");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_thresholds(start: f64, stop: f64, steps: usize) -> Result<()> {
    let scanner = InefficiencyScanner::new(start, stop, steps)?;
    println!("{}", serde_json::to_string_pretty(&scanner.thresholds())?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run {
            inputs,
            config,
            output,
            double_ended,
            trigger_threshold,
            scan_start,
            scan_stop,
            scan_steps,
        } => cmd_run(
            &inputs,
            config.as_ref(),
            output.as_ref(),
            double_ended,
            trigger_threshold,
            scan_start,
            scan_stop,
            scan_steps,
        ),
        Commands::Thresholds { start, stop, steps } => cmd_thresholds(start, stop, steps),
    }
}
