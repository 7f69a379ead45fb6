//! # Job Orchestrator
//!
//! Partitions the workload into `num_jobs` [`JobSpec`]s, runs them all
//! concurrently and waits for every one of them before reporting.
//!
//! ## Concurrency
//!
//! Each job runs on its own tokio task; each task holds one permit of a
//! semaphore sized to `num_jobs`, so the pool is exactly as wide as the job
//! count and nothing queues. A failed job does not cancel the others. There is
//! no timeout: a hung executable holds its slot until it exits.
//!
//! Results are always reported in job id order, independent of completion
//! order.

use crate::config::SimulationConfig;
use crate::error::JobFailure;
use crate::job::{JobResult, JobSpec};
use crate::logging::duration_ms;
use crate::runner::WorkerRunner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Executes one job. Implementations must contain every failure in the
/// returned result.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, spec: JobSpec) -> JobResult;
}

#[async_trait]
impl JobExecutor for WorkerRunner {
    async fn execute(&self, spec: JobSpec) -> JobResult {
        self.run(&spec).await
    }
}

/// Aggregate outcome of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationReport {
    pub num_jobs: u32,
    pub success_count: u32,
    /// One entry per job, ordered by job id
    pub results: Vec<JobResult>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl OrchestrationReport {
    pub fn all_succeeded(&self) -> bool {
        self.success_count == self.num_jobs
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|result| !result.success)
    }
}

pub struct JobOrchestrator {
    config: Arc<SimulationConfig>,
    executor: Arc<dyn JobExecutor>,
}

impl JobOrchestrator {
    /// Orchestrator running every job through a [`WorkerRunner`]
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        let executor = Arc::new(WorkerRunner::new(config.clone()));
        Self::with_executor(config, executor)
    }

    pub fn with_executor(config: Arc<SimulationConfig>, executor: Arc<dyn JobExecutor>) -> Self {
        Self { config, executor }
    }

    /// Run every job and wait for all of them
    pub async fn run(&self) -> OrchestrationReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let specs = JobSpec::partition(&self.config);
        let num_jobs = self.config.num_jobs();

        info!("Starting {} jobs...", num_jobs);

        let slots = Arc::new(Semaphore::new(specs.len()));
        let handles: Vec<_> = specs
            .into_iter()
            .map(|spec| {
                let job_id = spec.job_id;
                let executor = self.executor.clone();
                let slots = slots.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed, so acquisition cannot fail
                    let _permit = slots.acquire_owned().await.ok();
                    executor.execute(spec).await
                });
                (job_id, handle)
            })
            .collect();

        let (job_ids, handles): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let results: Vec<JobResult> = job_ids
            .into_iter()
            .zip(joined)
            .map(|(job_id, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(job_id = job_id, error = %e, "Worker task panicked");
                    JobResult::failed(
                        job_id,
                        JobFailure::Panicked {
                            reason: e.to_string(),
                        },
                        Duration::ZERO,
                    )
                }
            })
            .collect();

        let success_count =
            u32::try_from(results.iter().filter(|result| result.success).count()).unwrap_or(u32::MAX);

        let report = OrchestrationReport {
            num_jobs,
            success_count,
            results,
            started_at,
            elapsed: clock.elapsed(),
        };

        debug!(
            num_jobs = report.num_jobs,
            success_count = report.success_count,
            elapsed_ms = duration_ms(report.elapsed),
            "Orchestration barrier reached"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedExecutor {
        fail: Vec<u32>,
        panic_on: Option<u32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn execute(&self, spec: JobSpec) -> JobResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on == Some(spec.job_id) {
                panic!("executor blew up on job {}", spec.job_id);
            }
            // Later jobs finish first
            tokio::time::sleep(Duration::from_millis(u64::from(10 - spec.job_id.min(10)) * 5)).await;
            if self.fail.contains(&spec.job_id) {
                JobResult::failed(
                    spec.job_id,
                    JobFailure::ProcessFailed {
                        exit_code: Some(1),
                        stderr: String::new(),
                    },
                    Duration::ZERO,
                )
            } else {
                JobResult::succeeded(spec.job_id, Duration::ZERO)
            }
        }
    }

    fn config(num_jobs: u32) -> Arc<SimulationConfig> {
        Arc::new(
            SimulationConfig::try_from(SimulationSettings {
                num_jobs,
                ..SimulationSettings::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn results_are_ordered_by_job_id() {
        let executor = Arc::new(ScriptedExecutor {
            fail: vec![],
            panic_on: None,
            calls: AtomicUsize::new(0),
        });
        let report = JobOrchestrator::with_executor(config(5), executor.clone())
            .run()
            .await;

        let ids: Vec<u32> = report.results.iter().map(|r| r.job_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(report.all_succeeded());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let executor = Arc::new(ScriptedExecutor {
            fail: vec![0],
            panic_on: None,
            calls: AtomicUsize::new(0),
        });
        let report = JobOrchestrator::with_executor(config(4), executor.clone())
            .run()
            .await;

        assert_eq!(executor.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.success_count, 3);
        assert!(!report.all_succeeded());
        let failed: Vec<u32> = report.failed_jobs().map(|r| r.job_id).collect();
        assert_eq!(failed, vec![0]);
    }

    #[tokio::test]
    async fn panicking_job_is_contained() {
        let executor = Arc::new(ScriptedExecutor {
            fail: vec![],
            panic_on: Some(1),
            calls: AtomicUsize::new(0),
        });
        let report = JobOrchestrator::with_executor(config(3), executor)
            .run()
            .await;

        let success: Vec<bool> = report.results.iter().map(|r| r.success).collect();
        assert_eq!(success, vec![true, false, true]);
        assert!(matches!(
            report.results[1].failure,
            Some(JobFailure::Panicked { .. })
        ));
    }
}
