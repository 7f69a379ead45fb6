//! # Structured Logging Module
//!
//! Console logging for interactive runs plus an optional JSON log file for
//! post-mortem inspection of long fan-outs.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Options for [`init_structured_logging`]
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// 0 = info, 1 = debug, 2+ = trace. Ignored when `RUST_LOG` is set.
    pub verbosity: u8,
    /// Write a JSON log file into this directory in addition to the console
    pub log_dir: Option<PathBuf>,
}

/// Initialize structured logging once per process.
///
/// A subscriber that is already installed (e.g. by a test harness) is kept.
pub fn init_structured_logging(options: &LoggingOptions) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(options.verbosity);

        let console = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        let mut log_path = None;
        let file = options.log_dir.as_ref().and_then(|log_dir| {
            if let Err(e) = fs::create_dir_all(log_dir) {
                eprintln!("Failed to create log directory {}: {e}", log_dir.display());
                return None;
            }

            // {environment}.{pid}.{timestamp}.log
            let pid = process::id();
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let log_filename = format!("{environment}.{pid}.{timestamp}.log");
            log_path = Some(log_dir.join(&log_filename));

            let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // The writer must outlive every log call for the rest of the process
            std::mem::forget(guard);

            Some(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(build_filter(&log_level)),
            )
        });

        let subscriber = tracing_subscriber::registry().with(console).with(file);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::debug!(
            pid = process::id(),
            environment = %environment,
            log_file = ?log_path,
            "Structured logging initialized"
        );
    });
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("parsim_core={default_level},parsim={default_level},warn"))
    })
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PARSIM_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(verbosity: u8) -> String {
    match verbosity {
        0 => "info".to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Whole milliseconds for a log field, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Log structured data for a job lifecycle operation
pub fn log_job_operation(
    operation: &str,
    job_id: u32,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        job_id = job_id,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_OPERATION"
    );
}

/// Log structured data for a merge operation
pub fn log_merge_operation(operation: &str, inputs: usize, target: &str, status: &str) {
    tracing::info!(
        operation = %operation,
        inputs = inputs,
        target = %target,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "MERGE_OPERATION"
    );
}
