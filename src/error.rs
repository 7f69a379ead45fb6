//! Error types for the simulation fan-out system.
//!
//! Errors are layered the same way failures are contained at runtime:
//!
//! - [`PreconditionError`] - the environment is unusable, nothing is started
//! - [`JobFailure`] - one job failed; recorded in its [`JobResult`](crate::job::JobResult)
//!   and never propagated to sibling jobs or to the orchestrator as an `Err`
//! - [`MergeError`] - the merge phase failed after every job succeeded
//! - [`ConfigurationError`] - settings could not be loaded or validated

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use crate::config::ConfigurationError;

/// Top-level error for library entry points that can fail before any job runs.
#[derive(Debug, Error)]
pub enum ParsimError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParsimError>;

/// Environment checks performed before orchestration starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Build directory '{path}' does not exist")]
    BuildDirMissing { path: PathBuf },
    #[error("Executable '{executable}' not found in '{build_dir}'. Please build first")]
    ExecutableMissing {
        executable: String,
        build_dir: PathBuf,
    },
    #[error("Failed to create data directory '{path}': {reason}")]
    DataDirUnavailable { path: PathBuf, reason: String },
}

/// Why a single job did not succeed.
///
/// Carried inside the job's result; the job boundary converts every fault into
/// one of these kinds so callers can tell them apart without changing the
/// pass/fail outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    #[error("precondition failed: {reason}")]
    PreconditionFailed { reason: String },
    #[error("failed to launch executable: {reason}")]
    LaunchFailed { reason: String },
    #[error("executable exited with {}", describe_exit(.exit_code))]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("expected output artifact not found at '{}'", .path.display())]
    ArtifactMissing { path: PathBuf },
    #[error("filesystem error during {operation} on '{}': {reason}", .path.display())]
    FilesystemError {
        operation: String,
        path: PathBuf,
        reason: String,
    },
    #[error("worker task panicked: {reason}")]
    Panicked { reason: String },
}

impl JobFailure {
    pub fn filesystem(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        error: &std::io::Error,
    ) -> Self {
        JobFailure::FilesystemError {
            operation: operation.into(),
            path: path.into(),
            reason: error.to_string(),
        }
    }

    /// Short, stable label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            JobFailure::PreconditionFailed { .. } => "precondition_failed",
            JobFailure::LaunchFailed { .. } => "launch_failed",
            JobFailure::ProcessFailed { .. } => "process_failed",
            JobFailure::ArtifactMissing { .. } => "artifact_missing",
            JobFailure::FilesystemError { .. } => "filesystem_error",
            JobFailure::Panicked { .. } => "panicked",
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("return code {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Failures of the merge phase, reported separately from job failures
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeError {
    #[error("'{tool}' command not found. Please ensure ROOT is installed")]
    ToolNotFound { tool: String },
    #[error("failed to launch '{tool}': {reason}")]
    LaunchFailed { tool: String, reason: String },
    #[error("'{tool}' exited with {}", describe_exit(.exit_code))]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("could not resolve merge target '{}': {reason}", .path.display())]
    TargetUnresolvable { path: PathBuf, reason: String },
}
