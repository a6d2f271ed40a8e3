//! Command-line interface for the recording repair pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::processors::{
    batch, classifier, repair_file, repair_tree, FileOutcome, Verdict,
};

#[derive(Parser)]
#[command(name = "rec-repair")]
#[command(about = "Repair GPS/IMU sensor recordings from mixed firmware revisions", version)]
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
    /// Repair a recording file or a directory tree of recordings
    Repair {
        /// Input recording file or directory
        input: PathBuf,
        /// Output recording file or directory
        output: PathBuf,
    },

    /// Classify a recording without writing anything
    Classify {
        /// Input recording file
        input: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
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
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
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

    // Load config
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

    // Dispatch to subcommands
    match cli.command {
        Commands::Repair { input, output } => {
            cmd_repair(&input, &output, &config);
        }
        Commands::Classify { input } => {
            cmd_classify(&input, &config);
        }
    }
}

fn verdict_rows(verdict: &Verdict) -> Vec<(&'static str, String)> {
    vec![
        ("Pre-SI units", verdict.before_si_patch.to_string()),
        ("Broken patch", verdict.from_broken_patch.to_string()),
        ("Drop switch-state", verdict.remove_switch_state.to_string()),
        ("Fine", verdict.is_fine().to_string()),
    ]
}

fn cmd_repair(input: &PathBuf, output: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    if let Err(e) = batch::check_distinct_paths(input, output) {
        error!("{}", e);
        std::process::exit(1);
    }

    if input.is_dir() {
        println!("Repairing recordings in batch mode...");
        println!("Input directory: {}", input.display());
        println!("Output directory: {}", output.display());

        let spinner = create_spinner("Scanning and repairing recordings...");

        match repair_tree(input, output, config) {
            Ok(summary) => {
                spinner.finish_and_clear();

                print_summary(
                    "Batch Repair Complete",
                    &[
                        ("Input directory", input.display().to_string()),
                        ("Output directory", output.display().to_string()),
                        ("Files found", summary.files_found.to_string()),
                        ("Copied verbatim", summary.files_copied.to_string()),
                        ("Rewritten", summary.files_rewritten.to_string()),
                        ("Skipped (existing)", summary.files_skipped.to_string()),
                        ("Duration", format!("{:.2?}", start.elapsed())),
                    ],
                );
            }
            Err(e) => {
                spinner.finish_and_clear();
                error!("Batch repair failed: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("Repairing single recording...");
        println!("Input: {}", input.display());
        println!("Output: {}", output.display());

        let spinner = create_spinner("Classifying and correcting...");

        match repair_file(input, output, config) {
            Ok(report) => {
                spinner.finish_and_clear();

                let mut items = vec![
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                ];
                items.extend(verdict_rows(&report.verdict));
                match report.outcome {
                    FileOutcome::Copied => {
                        items.push(("Action", "copied byte-for-byte".to_string()));
                    }
                    FileOutcome::Rewritten(stats) => {
                        items.push(("Records read", stats.records_read.to_string()));
                        items.push(("Records written", stats.records_written.to_string()));
                        items.push((
                            "Records dropped",
                            (stats.records_read - stats.records_written).to_string(),
                        ));
                    }
                }
                items.push(("Duration", format!("{:.2?}", start.elapsed())));

                print_summary("Repair Complete", &items);
            }
            Err(e) => {
                spinner.finish_and_clear();
                error!("Repair failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn cmd_classify(input: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    println!("Classifying recording...");
    println!("Input: {}", input.display());

    let spinner = create_spinner("Scanning records...");

    match classifier::classify_file(input, &config.classifier) {
        Ok(verdict) => {
            spinner.finish_and_clear();

            let mut items = vec![("Input file", input.display().to_string())];
            items.extend(verdict_rows(&verdict));
            items.push(("Duration", format!("{:.2?}", start.elapsed())));

            print_summary("Classification Complete", &items);
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Classification failed: {}", e);
            std::process::exit(1);
        }
    }
}
