//! # Job Working Directories
//!
//! [`WorkDir`] is a scoped guard over one job's isolated directory. Acquiring
//! it always yields a fresh, empty directory (a stale one left by an aborted
//! run is removed first). The directory is removed when the guard is released
//! and, as a fallback for panics and dropped futures, when it is dropped.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    released: bool,
}

impl WorkDir {
    pub async fn acquire(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        if fs::try_exists(&path).await? {
            warn!(path = %path.display(), "Removing stale working directory");
            fs::remove_dir_all(&path).await?;
        }
        fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created working directory");

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory and everything left inside it
    pub async fn release(mut self) -> io::Result<()> {
        self.released = true;
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed working directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove working directory");
            }
        }
    }
}

/// Move a file, falling back to copy-and-delete when a rename is not possible
/// (e.g. across filesystems)
pub async fn relocate(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %rename_error,
                "Rename failed, copying instead"
            );
            if fs::copy(src, dst).await.is_err() {
                return Err(rename_error);
            }
            fs::remove_file(src).await
        }
    }
}
