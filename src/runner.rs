//! # Worker Runner
//!
//! Executes exactly one [`JobSpec`] end to end:
//!
//! 1. acquire a fresh working directory `{build_dir}/work_{job_id}`
//! 2. copy the executable into it, so every job runs its own copy
//! 3. write the run descriptor with the job's seed pair and event count
//! 4. run `./{executable} {descriptor}` inside the directory, capturing output
//! 5. require the fixed output artifact and move it to
//!    `{build_dir}/{prefix}{job_id}.root`
//! 6. for job 0 only, move the process-id map into the data directory
//!
//! The working directory is removed on every exit path. Every fault is turned
//! into a [`JobFailure`] on the returned [`JobResult`]; nothing is retried.

use crate::config::SimulationConfig;
use crate::descriptor::RunDescriptor;
use crate::error::JobFailure;
use crate::job::{JobResult, JobSpec};
use crate::logging::{duration_ms, log_job_operation};
use crate::workspace::{relocate, WorkDir};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, instrument, trace, warn};

/// Upper bound on the stderr retained in a [`JobFailure::ProcessFailed`]
pub const STDERR_TAIL_BYTES: usize = 4096;

/// Upper bound on the stdout kept for trace logging; the rest is discarded
pub const STDOUT_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct WorkerRunner {
    config: Arc<SimulationConfig>,
}

impl WorkerRunner {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run one job to completion. Never returns an error: the outcome is in
    /// the result.
    #[instrument(skip(self, spec), fields(job_id = spec.job_id))]
    pub async fn run(&self, spec: &JobSpec) -> JobResult {
        let started = Instant::now();
        log_job_operation("start", spec.job_id, "running", None, None);

        let outcome = match WorkDir::acquire(&spec.work_dir).await {
            Ok(work_dir) => {
                let outcome = self.execute_in(&work_dir, spec).await;
                let released = work_dir.release().await.map_err(|e| {
                    JobFailure::filesystem("remove working directory", &spec.work_dir, &e)
                });
                // An earlier failure is the more useful cause to report
                outcome.and(released)
            }
            Err(e) => Err(JobFailure::filesystem(
                "prepare working directory",
                &spec.work_dir,
                &e,
            )),
        };

        let result = JobResult::from_outcome(spec.job_id, outcome, started.elapsed());
        let elapsed_ms = duration_ms(result.duration);

        match &result.failure {
            None => {
                debug!(
                    job_id = spec.job_id,
                    "Completed in {:.2}s",
                    result.duration.as_secs_f64()
                );
                log_job_operation("finish", spec.job_id, "succeeded", Some(elapsed_ms), None);
            }
            Some(failure) => {
                error!(
                    job_id = spec.job_id,
                    kind = failure.kind(),
                    "[Job {}] FAILED: {}",
                    spec.job_id,
                    failure
                );
                let details = failure.to_string();
                log_job_operation(
                    "finish",
                    spec.job_id,
                    "failed",
                    Some(elapsed_ms),
                    Some(&details),
                );
            }
        }

        result
    }

    async fn execute_in(&self, work_dir: &WorkDir, spec: &JobSpec) -> Result<(), JobFailure> {
        let executable = self.stage_executable(work_dir).await?;
        let descriptor = self.write_descriptor(work_dir, spec).await?;
        self.invoke(work_dir, spec, &executable, &descriptor).await?;
        self.collect_artifact(work_dir, spec).await?;

        if spec.publishes_process_map() {
            self.collect_process_map(work_dir).await?;
        }

        Ok(())
    }

    /// Copy the shared executable into the job directory and return the name
    /// to invoke it by
    async fn stage_executable(&self, work_dir: &WorkDir) -> Result<String, JobFailure> {
        let source = self.config.executable_path();
        let name = self.config.executable_name();

        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Err(JobFailure::PreconditionFailed {
                reason: format!("executable '{}' does not exist", source.display()),
            });
        }

        let destination = work_dir.join(name);
        fs::copy(&source, &destination)
            .await
            .map_err(|e| JobFailure::filesystem("copy executable", &destination, &e))?;

        Ok(format!("./{name}"))
    }

    async fn write_descriptor(
        &self,
        work_dir: &WorkDir,
        spec: &JobSpec,
    ) -> Result<String, JobFailure> {
        let name = &self.config.artifacts().run_descriptor;
        let descriptor = RunDescriptor::render(self.config.descriptor_template(), spec);
        let path = work_dir.join(name);

        fs::write(&path, descriptor.as_bytes())
            .await
            .map_err(|e| JobFailure::filesystem("write run descriptor", &path, &e))?;

        Ok(name.clone())
    }

    async fn invoke(
        &self,
        work_dir: &WorkDir,
        spec: &JobSpec,
        executable: &str,
        descriptor: &str,
    ) -> Result<(), JobFailure> {
        debug!(
            job_id = spec.job_id,
            events = spec.events,
            cwd = %work_dir.path().display(),
            "Launching {} {}",
            executable,
            descriptor
        );

        let mut child = Command::new(executable)
            .arg(descriptor)
            .current_dir(work_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| JobFailure::LaunchFailed {
                reason: e.to_string(),
            })?;

        let (stdout, stderr, status) = tokio::join!(
            read_tail(child.stdout.take(), STDOUT_TAIL_BYTES),
            read_tail(child.stderr.take(), STDERR_TAIL_BYTES),
            child.wait()
        );
        let status = status.map_err(|e| JobFailure::LaunchFailed {
            reason: format!("waiting for process: {e}"),
        })?;
        let stdout = stdout.unwrap_or_else(|e| {
            warn!(job_id = spec.job_id, error = %e, "Failed to read executable stdout");
            Vec::new()
        });
        let stderr = stderr.unwrap_or_else(|e| {
            warn!(job_id = spec.job_id, error = %e, "Failed to read executable stderr");
            Vec::new()
        });
        trace!(
            job_id = spec.job_id,
            stdout = %String::from_utf8_lossy(&stdout),
            "Executable stdout tail"
        );

        if status.success() {
            return Ok(());
        }

        let stderr = stderr_tail(&stderr, STDERR_TAIL_BYTES);
        if self.config.log_failed_stderr() {
            error!(job_id = spec.job_id, "[Job {}] Stderr:\n{}", spec.job_id, stderr);
        } else {
            debug!(job_id = spec.job_id, stderr = %stderr, "Executable stderr");
        }

        Err(JobFailure::ProcessFailed {
            exit_code: status.code(),
            stderr,
        })
    }

    async fn collect_artifact(&self, work_dir: &WorkDir, spec: &JobSpec) -> Result<(), JobFailure> {
        let source = work_dir.join(&self.config.artifacts().simulation_output);
        if !is_file(&source).await {
            warn!(job_id = spec.job_id, "[Job {}] Output ROOT file not found", spec.job_id);
            return Err(JobFailure::ArtifactMissing { path: source });
        }

        let destination = self.config.build_dir().join(&spec.output_name);
        relocate(&source, &destination)
            .await
            .map_err(|e| JobFailure::filesystem("move output artifact", &destination, &e))?;

        debug!(job_id = spec.job_id, path = %destination.display(), "Output artifact relocated");
        Ok(())
    }

    async fn collect_process_map(&self, work_dir: &WorkDir) -> Result<(), JobFailure> {
        let source = work_dir.join(&self.config.artifacts().process_map);
        if !is_file(&source).await {
            debug!("No process-id map produced");
            return Ok(());
        }

        let destination = self.config.data_dir().join(self.config.process_map_name());
        relocate(&source, &destination)
            .await
            .map_err(|e| JobFailure::filesystem("move process-id map", &destination, &e))?;

        debug!(path = %destination.display(), "Process-id map relocated");
        Ok(())
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Drain a pipe to EOF, keeping only its last `max_bytes`
async fn read_tail<R>(reader: Option<R>, max_bytes: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };

    let mut tail = Vec::with_capacity(max_bytes);
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        tail.extend_from_slice(&chunk[..read]);
        if tail.len() > max_bytes {
            let excess = tail.len() - max_bytes;
            tail.drain(..excess);
        }
    }
    Ok(tail)
}

/// Last `max_bytes` of a process' stderr, cut on a character boundary
fn stderr_tail(stderr: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
