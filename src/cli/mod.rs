//! Command-line interface for the scan pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::loaders::load_raw_table;
use crate::core::observer::{LogObserver, PipelineObserver, Stage};
use crate::processors::ingest::{ingest, IngestIssue};
use crate::processors::pipeline;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "radar-scan-pipeline")]
#[command(about = "Multi-hypothesis radar detection pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest, project and filter one raw log, writing detection CSVs
    Process {
        /// Raw measurement CSV
        input: PathBuf,
        /// Output directory for detection and region CSVs
        output_dir: PathBuf,
        /// Fail if any snapshot exceeds the capacity ceiling
        #[arg(long)]
        strict: bool,
    },

    /// Process every CSV log in a directory (batch mode)
    Batch {
        /// Directory containing raw measurement CSVs
        input_dir: PathBuf,
        /// Output directory for detection and region CSVs
        output_dir: PathBuf,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
        /// Fail a file if any snapshot exceeds the capacity ceiling
        #[arg(long)]
        strict: bool,
    },

    /// Ingest one raw log and report snapshot counts, capacities and issues
    Inspect {
        /// Raw measurement CSV
        input: PathBuf,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Output YAML path
        output: PathBuf,
    },
}

/// Observer that drives a progress bar over the snapshots of each stage.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg:<8} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for ProgressObserver {
    fn on_stage_start(&self, stage: Stage, snapshots: usize) {
        self.bar.reset();
        self.bar.set_length(snapshots as u64);
        self.bar.set_message(stage.to_string());
    }

    fn on_snapshot(&self, _stage: Stage, _snapshot: usize) {
        self.bar.inc(1);
    }

    fn on_issue(&self, issue: &IngestIssue) {
        self.bar.suspend(|| warn!("{}", issue));
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Process {
            input,
            output_dir,
            strict,
        } => cmd_process(&input, &output_dir, strict, config),
        Commands::Batch {
            input_dir,
            output_dir,
            limit,
            strict,
        } => cmd_batch(&input_dir, &output_dir, limit, strict, config),
        Commands::Inspect { input } => cmd_inspect(&input, &config),
        Commands::InitConfig { output } => cmd_init_config(&output, &config),
    }
}

fn cmd_process(input: &PathBuf, output_dir: &PathBuf, strict: bool, mut config: PipelineConfig) {
    let start = Instant::now();
    config.ingest.strict_capacity |= strict;

    let observer = ProgressObserver::new();
    let result = pipeline::process_file(input, output_dir, &config, &observer);
    observer.finish();

    match result {
        Ok(summary) => {
            let outputs: Vec<String> = summary
                .outputs
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            print_summary(
                "Processing Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Snapshots", summary.snapshots.to_string()),
                    ("Near detections", summary.near_detections.to_string()),
                    ("Far detections", summary.far_detections.to_string()),
                    ("Ingest issues", summary.issues.to_string()),
                    ("Output files", outputs.join(", ")),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Processing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_batch(
    input_dir: &PathBuf,
    output_dir: &PathBuf,
    limit: Option<usize>,
    strict: bool,
    mut config: PipelineConfig,
) {
    let start = Instant::now();
    config.ingest.strict_capacity |= strict;

    let spinner = create_spinner("Processing raw logs...");
    let result = pipeline::process_directory(input_dir, output_dir, limit, &config, &LogObserver);
    spinner.finish_and_clear();

    match result {
        Ok(summaries) => {
            let near: usize = summaries.iter().map(|s| s.near_detections).sum();
            let far: usize = summaries.iter().map(|s| s.far_detections).sum();
            let issues: usize = summaries.iter().map(|s| s.issues).sum();
            print_summary(
                "Batch Processing Complete",
                &[
                    ("Input directory", input_dir.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Files processed", summaries.len().to_string()),
                    ("Near detections", near.to_string()),
                    ("Far detections", far.to_string()),
                    ("Ingest issues", issues.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Batch processing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_inspect(input: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    let table = match load_raw_table(input) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to load {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    let observer = ProgressObserver::new();
    let result = ingest(&table, &config.ingest, &observer);
    observer.finish();

    match result {
        Ok(outcome) => {
            for issue in &outcome.issues {
                println!("  - {}", issue);
            }
            let series = &outcome.series;
            print_summary(
                "Ingest Summary",
                &[
                    ("Input file", input.display().to_string()),
                    ("Rows", table.len().to_string()),
                    ("Snapshots", series.snapshot_count().to_string()),
                    ("Near capacity", series.near.capacity().to_string()),
                    ("Near detections", series.near.total_detections().to_string()),
                    ("Far capacity", series.far.capacity().to_string()),
                    ("Far detections", series.far.total_detections().to_string()),
                    ("Issues", outcome.issues.len().to_string()),
                    ("Capacity overflow", outcome.has_overflow().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Ingestion failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(output: &PathBuf, config: &PipelineConfig) {
    match config.to_yaml(output) {
        Ok(()) => println!("Wrote configuration to {}", output.display()),
        Err(e) => {
            error!("Failed to write {}: {}", output.display(), e);
            std::process::exit(1);
        }
    }
}
