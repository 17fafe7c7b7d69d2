//! Per-job working directory.
//!
//! Every file a job writes lives under `<work_dir>/<job_id>/`, so two jobs
//! never share a path and removing the directory removes every artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use vrelay_models::JobId;

const TRANSCODE_OUTPUT: &str = "stream.mp4";
const THUMBNAIL: &str = "thumbnail.jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArtifacts {
    dir: PathBuf,
}

impl JobArtifacts {
    pub fn new(work_dir: impl AsRef<Path>, job_id: &JobId) -> Self {
        Self {
            dir: work_dir.as_ref().join(job_id.as_str()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Target of the streaming re-encode.
    pub fn transcode_output(&self) -> PathBuf {
        self.dir.join(TRANSCODE_OUTPUT)
    }

    pub fn thumbnail(&self) -> PathBuf {
        self.dir.join(THUMBNAIL)
    }

    pub async fn create(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Delete the directory and everything in it. Already-missing is fine.
    pub async fn remove(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "Removed job artifacts");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
