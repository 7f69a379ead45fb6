#![allow(clippy::doc_markdown)] // Allow technical terms like Geant4, ROOT in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Parsim Core
//!
//! Fan-out runner for independent simulation jobs.
//!
//! ## Overview
//!
//! A run executes the same simulation binary `num_jobs` times, each job with
//! its own event budget, seed pair and isolated working directory. Per-job
//! output files are collected into the build directory and merged into a
//! single result file only when every job succeeded.
//!
//! ## Module Organization
//!
//! - [`config`] - Settings loading and the validated [`SimulationConfig`]
//! - [`job`] - Job partitioning, [`JobSpec`] and [`JobResult`]
//! - [`runner`] - [`WorkerRunner`], one job end to end
//! - [`orchestrator`] - [`JobOrchestrator`], concurrent fan-out and barrier
//! - [`merge`] - [`MergeGate`], the all-or-nothing merge
//! - [`preflight`] - Environment checks and the overwrite decision
//! - [`pipeline`] - The complete run
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Filesystem Layout
//!
//! ```text
//! {build_dir}/work_{job_id}/               transient, removed after every job
//! {build_dir}/{prefix}{job_id}.root        per-job artifacts, kept
//! {data_dir}/{stem}_ProcessIDMap.txt       side artifact from job 0
//! {data_dir}/{output_filename}             merged result
//! ```
//!
//! ## Known Limitations
//!
//! There is no per-job timeout: a hung executable blocks the run until it
//! exits.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod job;
pub mod logging;
pub mod merge;
pub mod orchestrator;
pub mod pipeline;
pub mod preflight;
pub mod runner;
pub mod workspace;

pub use self::config::{ConfigLoader, SimulationConfig, SimulationSettings};
pub use error::{JobFailure, MergeError, ParsimError, PreconditionError, Result};
pub use job::{JobResult, JobSpec, SeedPair};
pub use merge::{MergeGate, MergeManifest, MergeStatus};
pub use orchestrator::{JobExecutor, JobOrchestrator, OrchestrationReport};
pub use pipeline::{PipelineOutcome, RunSummary, SimulationPipeline};
pub use preflight::{AssumeNo, AssumeYes, OverwritePrompt, PreflightReport};
pub use runner::WorkerRunner;
