//! # Parsim
//!
//! Run simulation jobs in parallel and merge their outputs.
//!
//! ```text
//! parsim [OUTPUT] [-j JOBS] [-n EVENTS] [-c CONFIG] [-y] [-v...]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use parsim_core::config::{ConfigLoader, SimulationConfig};
use parsim_core::logging::{init_structured_logging, LoggingOptions};
use parsim_core::merge::MergeStatus;
use parsim_core::pipeline::{PipelineOutcome, RunSummary, SimulationPipeline};
use parsim_core::preflight::{AssumeYes, OverwritePrompt};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::error;

const EXIT_MERGED: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_MERGE_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "parsim")]
#[command(about = "Run simulations in parallel and merge the results")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Output ROOT filename (default: result.root)
    output: Option<String>,

    /// Number of parallel jobs (default: 50)
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<u32>,

    /// Events per job (default: 10000)
    #[arg(short = 'n', long = "events")]
    events: Option<u64>,

    /// Settings file (YAML); defaults to ./parsim.yaml or ./config/parsim.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overwrite an existing output file without asking
    #[arg(short, long)]
    yes: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write JSON logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Asks on the console before replacing an existing output file
struct ConsolePrompt;

impl OverwritePrompt for ConsolePrompt {
    fn confirm_overwrite(&self, target: &Path) -> bool {
        println!("\nWARNING: The target file '{}' already exists.", target.display());
        print!("Do you want to overwrite it? (y/N): ");
        if io::stdout().flush().is_err() {
            return false;
        }

        // Blocking stdin read; keep it off the async worker
        tokio::task::block_in_place(|| read_confirmation(&mut io::stdin().lock()))
    }
}

/// Only an explicit `y` confirms
fn read_confirmation(input: &mut impl BufRead) -> bool {
    let mut response = String::new();
    match input.read_line(&mut response) {
        Ok(_) => response.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_structured_logging(&LoggingOptions {
        verbosity: cli.verbose,
        log_dir: cli.log_dir.clone(),
    });

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(EXIT_FAILED);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Arc::new(load_config(&cli)?);
    let pipeline = SimulationPipeline::new(config.clone());

    let outcome = if cli.yes {
        pipeline.run(&AssumeYes).await
    } else {
        pipeline.run(&ConsolePrompt).await
    }?;

    let summary = match outcome {
        PipelineOutcome::Aborted => {
            println!("Aborted by user.");
            return Ok(EXIT_MERGED);
        }
        PipelineOutcome::Finished(summary) => summary,
    };

    print_summary(&summary, &config, cli.format)?;

    Ok(match summary.merge {
        MergeStatus::Performed { .. } => EXIT_MERGED,
        MergeStatus::Skipped { .. } => EXIT_FAILED,
        MergeStatus::Failed { .. } => EXIT_MERGE_FAILED,
    })
}

/// Defaults < settings file < environment < command line
fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut settings = loader.load().context("loading settings")?;

    if let Some(output) = &cli.output {
        settings.output_filename = output.clone();
    }
    if let Some(jobs) = cli.jobs {
        settings.num_jobs = jobs;
    }
    if let Some(events) = cli.events {
        settings.events_per_job = events;
    }

    SimulationConfig::try_from(settings).context("validating settings")
}

fn print_summary(summary: &RunSummary, config: &SimulationConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            let report = &summary.report;
            println!(
                "\nSummary: {}/{} jobs succeeded.",
                report.success_count, report.num_jobs
            );
            for result in report.failed_jobs() {
                if let Some(failure) = &result.failure {
                    println!("  [Job {}] {}", result.job_id, failure);
                }
            }
            match &summary.merge {
                MergeStatus::Performed { inputs, .. } => println!(
                    "Merge performed: {} files into '{}'",
                    inputs,
                    config.target_path().display()
                ),
                MergeStatus::Skipped { .. } => println!("Some jobs failed. Merge skipped."),
                MergeStatus::Failed { error } => println!("Merge failed: {error}"),
            }
        }
    }
    Ok(())
}
