//! # Job Model
//!
//! A run is partitioned into `num_jobs` immutable [`JobSpec`]s with ids
//! `0..num_jobs`. Every name a job touches is keyed by its id, so concurrent
//! jobs sharing the build directory never collide.

use crate::config::SimulationConfig;
use crate::error::JobFailure;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Job id that additionally publishes the process-id map side artifact
pub const PROCESS_MAP_JOB_ID: u32 = 0;

/// One unit of work: a single execution of the simulation for a fixed number
/// of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: u32,
    pub events: u64,
    /// Transient, job-exclusive directory: `{build_dir}/work_{job_id}`
    pub work_dir: PathBuf,
    /// Artifact name in the build directory: `{prefix}{job_id}.root`
    pub output_name: String,
    pub seeds: SeedPair,
}

/// Random seeds handed to the executable; distinct for every job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedPair {
    pub primary: u64,
    pub secondary: u64,
}

impl SeedPair {
    pub fn for_job(job_id: u32, offset: u64) -> Self {
        let primary = u64::from(job_id);
        Self {
            primary,
            secondary: primary + offset,
        }
    }
}

impl JobSpec {
    pub fn new(config: &SimulationConfig, job_id: u32) -> Self {
        Self {
            job_id,
            events: config.events_per_job(),
            work_dir: work_dir_for(config, job_id),
            output_name: config.job_output_name(job_id),
            seeds: SeedPair::for_job(job_id, config.seed_offset()),
        }
    }

    /// Split the configured workload into one spec per job, ordered by id
    pub fn partition(config: &SimulationConfig) -> Vec<JobSpec> {
        (0..config.num_jobs())
            .map(|job_id| JobSpec::new(config, job_id))
            .collect()
    }

    pub fn publishes_process_map(&self) -> bool {
        self.job_id == PROCESS_MAP_JOB_ID
    }
}

pub fn work_dir_for(config: &SimulationConfig, job_id: u32) -> PathBuf {
    config.build_dir().join(format!("work_{job_id}"))
}

/// Outcome of one job. A job either fully succeeded (artifact relocated) or
/// failed; there are no intermediate states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: u32,
    pub success: bool,
    pub failure: Option<JobFailure>,
    pub duration: Duration,
}

impl JobResult {
    pub fn succeeded(job_id: u32, duration: Duration) -> Self {
        Self {
            job_id,
            success: true,
            failure: None,
            duration,
        }
    }

    pub fn failed(job_id: u32, failure: JobFailure, duration: Duration) -> Self {
        Self {
            job_id,
            success: false,
            failure: Some(failure),
            duration,
        }
    }

    pub fn from_outcome(
        job_id: u32,
        outcome: Result<(), JobFailure>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(()) => Self::succeeded(job_id, duration),
            Err(failure) => Self::failed(job_id, failure, duration),
        }
    }
}
