//! # Simulation Configuration
//!
//! Settings are loaded once into [`SimulationSettings`] (the raw, layered
//! form), then validated into an immutable [`SimulationConfig`] that is shared
//! by reference with the orchestrator and every worker. There is no global
//! configuration state.
//!
//! ## Usage
//!
//! ```rust
//! use parsim_core::config::{SimulationConfig, SimulationSettings};
//!
//! let settings = SimulationSettings {
//!     num_jobs: 4,
//!     events_per_job: 1000,
//!     output_filename: "axion_scan".to_string(),
//!     ..SimulationSettings::default()
//! };
//!
//! let config = SimulationConfig::try_from(settings).unwrap();
//! assert_eq!(config.output_filename(), "axion_scan.root");
//! assert_eq!(config.total_events(), 4000);
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Extension every per-job artifact and the merged output carry
pub const OUTPUT_EXTENSION: &str = "root";

/// Suffix appended to the final output stem for the process-id map side artifact
pub const PROCESS_MAP_SUFFIX: &str = "_ProcessIDMap.txt";

/// Run descriptor rendered for every job unless overridden.
pub const DEFAULT_DESCRIPTOR_TEMPLATE: &str = "
/run/initialize
/CsI/generator/mode ePairDeflected
/CsI/random/seed {seed_a} {seed_b}
/CsI/random/apply  1
/run/beamOn {events}
";

/// Raw simulation settings as read from defaults, files and environment.
///
/// Field defaults match the historical runner layout (`build/CsI_Axion`,
/// `data/result.root`, 50 jobs of 10000 events).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub executable_name: String,
    pub build_dir: PathBuf,
    pub data_dir: PathBuf,
    pub num_jobs: u32,
    pub events_per_job: u64,
    pub output_prefix: String,
    pub output_filename: String,
    /// Offset between the two seeds of a job's seed pair
    pub seed_offset: u64,
    pub descriptor_template: String,
    /// Command used to merge per-job artifacts
    pub merge_tool: String,
    /// Log captured stderr of failed jobs at error level instead of debug
    pub log_failed_stderr: bool,
    pub artifacts: ArtifactNames,
}

/// Fixed file names the simulation executable reads and writes inside its
/// working directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub simulation_output: String,
    pub process_map: String,
    pub run_descriptor: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            simulation_output: "CsI_Axion.root".to_string(),
            process_map: "ProcessIDMap.txt".to_string(),
            run_descriptor: "run.mac".to_string(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            executable_name: "CsI_Axion".to_string(),
            build_dir: PathBuf::from("build"),
            data_dir: PathBuf::from("data"),
            num_jobs: 50,
            events_per_job: 10_000,
            output_prefix: "output_".to_string(),
            output_filename: "result.root".to_string(),
            seed_offset: 12_345,
            descriptor_template: DEFAULT_DESCRIPTOR_TEMPLATE.to_string(),
            merge_tool: "hadd".to_string(),
            log_failed_stderr: false,
            artifacts: ArtifactNames::default(),
        }
    }
}

/// Validated, read-only simulation configuration.
///
/// Invariants established by [`SimulationConfig::try_from`]:
/// - `num_jobs >= 1` and `events_per_job >= 1`
/// - the final output filename ends in `.root`
/// - executable and artifact names are plain, non-empty file names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    executable_name: String,
    build_dir: PathBuf,
    data_dir: PathBuf,
    num_jobs: u32,
    events_per_job: u64,
    output_prefix: String,
    output_filename: String,
    seed_offset: u64,
    descriptor_template: String,
    merge_tool: String,
    log_failed_stderr: bool,
    artifacts: ArtifactNames,
}

impl TryFrom<SimulationSettings> for SimulationConfig {
    type Error = ConfigurationError;

    fn try_from(settings: SimulationSettings) -> ConfigResult<Self> {
        if settings.num_jobs == 0 {
            return Err(ConfigurationError::invalid_value(
                "num_jobs",
                settings.num_jobs,
                "at least one job is required",
            ));
        }
        if settings.events_per_job == 0 {
            return Err(ConfigurationError::invalid_value(
                "events_per_job",
                settings.events_per_job,
                "every job must simulate at least one event",
            ));
        }
        if u64::from(settings.num_jobs)
            .checked_mul(settings.events_per_job)
            .is_none()
        {
            return Err(ConfigurationError::invalid_value(
                "events_per_job",
                settings.events_per_job,
                format!(
                    "total events across {} jobs exceed {}",
                    settings.num_jobs,
                    u64::MAX
                ),
            ));
        }

        require_file_name("executable_name", &settings.executable_name)?;
        require_file_name("output_filename", &settings.output_filename)?;
        require_file_name("artifacts.simulation_output", &settings.artifacts.simulation_output)?;
        require_file_name("artifacts.process_map", &settings.artifacts.process_map)?;
        require_file_name("artifacts.run_descriptor", &settings.artifacts.run_descriptor)?;

        if settings.output_prefix.contains(['/', '\\']) {
            return Err(ConfigurationError::invalid_value(
                "output_prefix",
                &settings.output_prefix,
                "prefix must not contain path separators",
            ));
        }
        if settings.merge_tool.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "merge_tool",
                &settings.merge_tool,
                "merge tool command must not be empty",
            ));
        }
        if settings.descriptor_template.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "descriptor_template",
                "<empty>",
                "run descriptor template must not be empty",
            ));
        }

        Ok(Self {
            output_filename: with_output_extension(&settings.output_filename),
            executable_name: settings.executable_name,
            build_dir: settings.build_dir,
            data_dir: settings.data_dir,
            num_jobs: settings.num_jobs,
            events_per_job: settings.events_per_job,
            output_prefix: settings.output_prefix,
            seed_offset: settings.seed_offset,
            descriptor_template: settings.descriptor_template,
            merge_tool: settings.merge_tool,
            log_failed_stderr: settings.log_failed_stderr,
            artifacts: settings.artifacts,
        })
    }
}

impl SimulationConfig {
    pub fn executable_name(&self) -> &str {
        &self.executable_name
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn num_jobs(&self) -> u32 {
        self.num_jobs
    }

    pub fn events_per_job(&self) -> u64 {
        self.events_per_job
    }

    pub fn total_events(&self) -> u64 {
        u64::from(self.num_jobs).saturating_mul(self.events_per_job)
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    /// Final merged output file name, always ending in `.root`
    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }

    pub fn seed_offset(&self) -> u64 {
        self.seed_offset
    }

    pub fn descriptor_template(&self) -> &str {
        &self.descriptor_template
    }

    pub fn merge_tool(&self) -> &str {
        &self.merge_tool
    }

    pub fn log_failed_stderr(&self) -> bool {
        self.log_failed_stderr
    }

    pub fn artifacts(&self) -> &ArtifactNames {
        &self.artifacts
    }

    /// Location of the shared executable every job copies from
    pub fn executable_path(&self) -> PathBuf {
        self.build_dir.join(&self.executable_name)
    }

    /// `{data_dir}/{output_filename}`
    pub fn target_path(&self) -> PathBuf {
        self.data_dir.join(&self.output_filename)
    }

    /// Per-job artifact name: `{prefix}{job_id}.root`
    pub fn job_output_name(&self, job_id: u32) -> String {
        format!("{}{}.{}", self.output_prefix, job_id, OUTPUT_EXTENSION)
    }

    /// Name of the relocated process-id map: `{output stem}_ProcessIDMap.txt`
    pub fn process_map_name(&self) -> String {
        let stem = Path::new(&self.output_filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_filename.clone());
        format!("{stem}{PROCESS_MAP_SUFFIX}")
    }
}

fn with_output_extension(filename: &str) -> String {
    let suffix = format!(".{OUTPUT_EXTENSION}");
    if filename.ends_with(&suffix) {
        filename.to_string()
    } else {
        format!("{filename}{suffix}")
    }
}

fn require_file_name(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::invalid_value(
            field,
            "<empty>",
            "value must not be empty",
        ));
    }
    let path = Path::new(value);
    if path.file_name().map(|name| name == path.as_os_str()) != Some(true) {
        return Err(ConfigurationError::invalid_value(
            field,
            value,
            "must be a plain file name without directories",
        ));
    }
    Ok(())
}
