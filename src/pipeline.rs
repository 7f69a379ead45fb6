//! # Simulation Pipeline
//!
//! The full run: preflight, optional overwrite confirmation, orchestration of
//! every job, then the merge gate.
//!
//! ```rust,no_run
//! use parsim_core::config::{SimulationConfig, SimulationSettings};
//! use parsim_core::pipeline::{PipelineOutcome, SimulationPipeline};
//! use parsim_core::preflight::AssumeYes;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let config = SimulationConfig::try_from(SimulationSettings::default()).unwrap();
//! let pipeline = SimulationPipeline::new(Arc::new(config));
//!
//! if let PipelineOutcome::Finished(summary) = pipeline.run(&AssumeYes).await.unwrap() {
//!     println!("{}/{} jobs succeeded", summary.report.success_count, summary.report.num_jobs);
//! }
//! # });
//! ```

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::merge::{MergeGate, MergeStatus};
use crate::orchestrator::{JobExecutor, JobOrchestrator, OrchestrationReport};
use crate::preflight::{check_environment, OverwritePrompt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Everything a finished run reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub report: OrchestrationReport,
    pub merge: MergeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Overwriting the existing merged output was declined; nothing ran
    Aborted,
    Finished(RunSummary),
}

pub struct SimulationPipeline {
    config: Arc<SimulationConfig>,
    orchestrator: JobOrchestrator,
    merge_gate: MergeGate,
}

impl SimulationPipeline {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        Self {
            orchestrator: JobOrchestrator::new(config.clone()),
            merge_gate: MergeGate::new(config.clone()),
            config,
        }
    }

    /// Pipeline whose jobs run through a custom executor
    pub fn with_executor(config: Arc<SimulationConfig>, executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            orchestrator: JobOrchestrator::with_executor(config.clone(), executor),
            merge_gate: MergeGate::new(config.clone()),
            config,
        }
    }

    pub async fn run(&self, prompt: &dyn OverwritePrompt) -> Result<PipelineOutcome> {
        let preflight = check_environment(&self.config).await?;

        if let Some(target) = &preflight.existing_target {
            if !prompt.confirm_overwrite(target) {
                info!("Aborted by user.");
                return Ok(PipelineOutcome::Aborted);
            }
            info!("File will be overwritten.");
        }

        self.log_configuration();

        let report = self.orchestrator.run().await;
        info!(
            "Summary: {}/{} jobs succeeded.",
            report.success_count, report.num_jobs
        );

        let merge = self.merge_gate.run(&report).await;

        Ok(PipelineOutcome::Finished(RunSummary { report, merge }))
    }

    fn log_configuration(&self) {
        let config = &self.config;
        info!(
            output_file = config.output_filename(),
            jobs = config.num_jobs(),
            events_per_job = config.events_per_job(),
            total_events = config.total_events(),
            "Configuration"
        );
    }
}
