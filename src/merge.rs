//! # Merge Gate
//!
//! All-or-nothing merge of per-job artifacts. The merge tool only runs when
//! every job succeeded; a subset is never merged.
//!
//! The tool is invoked as `{tool} -f {target} {inputs...}` with the build
//! directory as its working directory. Inputs are the relative artifact names,
//! the target is absolute so it resolves to the data directory regardless of
//! that working directory. Per-job artifacts are left in place whatever the
//! outcome, so a failed merge can be retried by hand.

use crate::config::SimulationConfig;
use crate::error::MergeError;
use crate::logging::log_merge_operation;
use crate::orchestrator::OrchestrationReport;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Flag instructing the merge tool to overwrite an existing target
pub const FORCE_OVERWRITE_FLAG: &str = "-f";

/// Ordered inputs and resolved target of a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeManifest {
    /// Artifact names relative to the build directory, in job id order
    pub inputs: Vec<PathBuf>,
    /// Absolute path of the merged output
    pub target: PathBuf,
}

impl MergeManifest {
    pub fn from_config(config: &SimulationConfig) -> Result<Self, MergeError> {
        let inputs = (0..config.num_jobs())
            .map(|job_id| PathBuf::from(config.job_output_name(job_id)))
            .collect();
        let target = absolute_path(&config.target_path()).map_err(|e| {
            MergeError::TargetUnresolvable {
                path: config.target_path(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { inputs, target })
    }

    /// Arguments passed to the merge tool, in order
    pub fn arguments(&self) -> Vec<&std::ffi::OsStr> {
        let mut args = Vec::with_capacity(self.inputs.len() + 2);
        args.push(std::ffi::OsStr::new(FORCE_OVERWRITE_FLAG));
        args.push(self.target.as_os_str());
        args.extend(self.inputs.iter().map(|input| input.as_os_str()));
        args
    }
}

/// What the merge phase did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeStatus {
    Performed { inputs: usize, target: PathBuf },
    Skipped { succeeded: u32, total: u32 },
    Failed { error: MergeError },
}

impl MergeStatus {
    pub fn performed(&self) -> bool {
        matches!(self, MergeStatus::Performed { .. })
    }
}

pub struct MergeGate {
    config: Arc<SimulationConfig>,
}

impl MergeGate {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        Self { config }
    }

    /// Merge iff every job in the report succeeded
    pub async fn run(&self, report: &OrchestrationReport) -> MergeStatus {
        if !report.all_succeeded() {
            info!("Some jobs failed. Skipping merge.");
            return MergeStatus::Skipped {
                succeeded: report.success_count,
                total: report.num_jobs,
            };
        }

        let manifest = match MergeManifest::from_config(&self.config) {
            Ok(manifest) => manifest,
            Err(error) => {
                error!("Error merging files: {}", error);
                return MergeStatus::Failed { error };
            }
        };

        match self.merge(&manifest).await {
            Ok(()) => {
                info!(
                    "Successfully merged {} files into '{}'",
                    manifest.inputs.len(),
                    self.config.target_path().display()
                );
                MergeStatus::Performed {
                    inputs: manifest.inputs.len(),
                    target: manifest.target,
                }
            }
            Err(error) => {
                error!("Error merging files: {}", error);
                MergeStatus::Failed { error }
            }
        }
    }

    /// Invoke the merge tool over `manifest`
    pub async fn merge(&self, manifest: &MergeManifest) -> Result<(), MergeError> {
        let tool = self.config.merge_tool();
        let target = manifest.target.display().to_string();
        info!("Merging files...");
        log_merge_operation("merge", manifest.inputs.len(), &target, "started");

        let output = Command::new(tool)
            .args(manifest.arguments())
            .current_dir(self.config.build_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => MergeError::ToolNotFound {
                    tool: tool.to_string(),
                },
                _ => MergeError::LaunchFailed {
                    tool: tool.to_string(),
                    reason: e.to_string(),
                },
            })?;

        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            "Merge tool output"
        );

        if !output.status.success() {
            log_merge_operation("merge", manifest.inputs.len(), &target, "failed");
            return Err(MergeError::ToolFailed {
                tool: tool.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        log_merge_operation("merge", manifest.inputs.len(), &target, "completed");
        Ok(())
    }
}

fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
