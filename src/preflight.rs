//! Environment checks run before any job is started.

use crate::config::SimulationConfig;
use crate::error::PreconditionError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    /// The data directory did not exist and was created
    pub created_data_dir: bool,
    /// The merged output already exists and would be overwritten
    pub existing_target: Option<PathBuf>,
}

/// Decides whether an existing merged output may be overwritten
pub trait OverwritePrompt: Send + Sync {
    fn confirm_overwrite(&self, target: &Path) -> bool;
}

/// Always allows overwriting (non-interactive runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl OverwritePrompt for AssumeYes {
    fn confirm_overwrite(&self, _target: &Path) -> bool {
        true
    }
}

/// Never allows overwriting
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl OverwritePrompt for AssumeNo {
    fn confirm_overwrite(&self, _target: &Path) -> bool {
        false
    }
}

/// Verify the build directory and executable, and prepare the data directory
pub async fn check_environment(
    config: &SimulationConfig,
) -> Result<PreflightReport, PreconditionError> {
    let build_dir = config.build_dir();
    if !is_dir(build_dir).await {
        return Err(PreconditionError::BuildDirMissing {
            path: build_dir.to_path_buf(),
        });
    }

    if !fs::try_exists(config.executable_path()).await.unwrap_or(false) {
        return Err(PreconditionError::ExecutableMissing {
            executable: config.executable_name().to_string(),
            build_dir: build_dir.to_path_buf(),
        });
    }

    let data_dir = config.data_dir();
    let created_data_dir = if is_dir(data_dir).await {
        false
    } else {
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| PreconditionError::DataDirUnavailable {
                path: data_dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!("Created directory: {}", data_dir.display());
        true
    };

    let target = config.target_path();
    let existing_target = if fs::try_exists(&target).await.unwrap_or(false) {
        warn!("The target file '{}' already exists.", target.display());
        Some(target)
    } else {
        None
    };

    Ok(PreflightReport {
        created_data_dir,
        existing_target,
    })
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}
