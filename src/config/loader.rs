//! Configuration Loader
//!
//! Layered settings loading with the `config` crate. Sources, lowest to highest
//! precedence:
//!
//! 1. Built-in defaults ([`SimulationSettings::default`])
//! 2. A YAML file - an explicit path, or the first of `./parsim.yaml` and
//!    `./config/parsim.yaml` that exists
//! 3. Environment variables prefixed with `PARSIM_` (nested keys use `__`,
//!    e.g. `PARSIM_ARTIFACTS__PROCESS_MAP`)
//!
//! Command-line overrides are applied by the caller on the returned settings.

use super::error::{ConfigResult, ConfigurationError};
use super::SimulationSettings;
use ::config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "PARSIM";

const DISCOVERY_PATHS: [&str; 2] = ["parsim.yaml", "config/parsim.yaml"];

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: Option<String>,
    discover: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with file discovery and `PARSIM_` environment overrides
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: Some(ENV_PREFIX.to_string()),
            discover: true,
        }
    }

    /// Use an explicit YAML file; it must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore environment variables entirely
    pub fn without_environment(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Do not look for a configuration file in the working directory
    pub fn without_discovery(mut self) -> Self {
        self.discover = false;
        self
    }

    /// Merge all sources into raw settings
    pub fn load(&self) -> ConfigResult<SimulationSettings> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&SimulationSettings::default())?);

        if let Some(path) = self.resolve_file()? {
            debug!(path = %path.display(), "Loading simulation settings file");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Yaml));
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let settings: SimulationSettings = builder
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigurationError::DeserializeError {
                error: e.to_string(),
            })?;

        debug!(
            num_jobs = settings.num_jobs,
            events_per_job = settings.events_per_job,
            build_dir = %settings.build_dir.display(),
            data_dir = %settings.data_dir.display(),
            "Simulation settings loaded"
        );

        Ok(settings)
    }

    fn resolve_file(&self) -> ConfigResult<Option<PathBuf>> {
        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(ConfigurationError::ConfigFileNotFound { path: path.clone() });
            }
            return Ok(Some(path.clone()));
        }

        if !self.discover {
            return Ok(None);
        }

        Ok(DISCOVERY_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.is_file())
            .map(Path::to_path_buf))
    }
}
