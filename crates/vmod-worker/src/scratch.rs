//! Per-run scratch directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use vmod_models::JobId;

use crate::error::WorkerResult;
use crate::metrics;

/// Local working directory owned by exactly one run.
///
/// Layout: `source/<video file>` and `frames/NNNNNN.png`. The directory is
/// removed by [`ScratchDir::close`], or on drop if the run is abandoned.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `work_dir`.
    pub async fn create(work_dir: &Path, job_id: &JobId) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(work_dir).await?;

        let prefix = format!("{}-", sanitize(job_id.as_str()));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(work_dir)?;
        debug!("Created scratch directory {}", dir.path().display());

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded source video goes.
    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.dir.path().join("source").join(sanitize(file_name))
    }

    /// Where the decoder writes frames.
    pub fn frames_dir(&self) -> PathBuf {
        self.dir.path().join("frames")
    }

    /// Remove the directory and everything in it.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
            metrics::record_cleanup_failure("local");
        } else {
            debug!("Removed scratch directory {}", path.display());
        }
    }
}

/// Keep a name safe for use as a single path component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
