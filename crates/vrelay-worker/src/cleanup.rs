//! Delayed artifact removal.
//!
//! Finished jobs keep their working directory for a grace period, then a
//! timer task deletes it. Each scheduled entry owns its timer handle so
//! shutdown can cancel the timers and delete right away. After shutdown no
//! timers are started; released directories are deleted on the spot.
//! Deletion errors are logged and counted, never returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use vrelay_models::JobId;

use crate::artifacts::JobArtifacts;
use crate::metrics;

struct Pending {
    handle: JoinHandle<()>,
    artifacts: JobArtifacts,
}

pub struct CleanupScheduler {
    grace: Duration,
    pending: Arc<Mutex<HashMap<JobId, Pending>>>,
    closed: AtomicBool,
}

impl CleanupScheduler {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Remove `artifacts` once the grace period has passed.
    ///
    /// Scheduling the same job twice restarts its timer.
    pub fn schedule(&self, job_id: JobId, artifacts: JobArtifacts) {
        let mut pending = self.pending.lock();

        let timer = {
            let pending = Arc::clone(&self.pending);
            let job_id = job_id.clone();
            let artifacts = artifacts.clone();
            let grace = self.grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                pending.lock().remove(&job_id);
                remove_logged(&job_id, &artifacts).await;
            })
        };

        if let Some(previous) = pending.insert(job_id, Pending { handle: timer, artifacts }) {
            previous.handle.abort();
        }
    }

    /// Hand over a finished job's directory.
    ///
    /// Waits out the grace period on a timer, or deletes now once the
    /// scheduler has been shut down.
    pub async fn release(&self, job_id: JobId, artifacts: JobArtifacts) {
        if self.is_closed() {
            remove_logged(&job_id, &artifacts).await;
        } else {
            self.schedule(job_id, artifacts);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel every timer and delete the scheduled directories now.
    ///
    /// Later releases skip the timer and delete immediately.
    pub async fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        if count > 0 {
            info!("Flushing {} scheduled artifact cleanups", count);
        }
        for (job_id, entry) in drained {
            entry.handle.abort();
            remove_logged(&job_id, &entry.artifacts).await;
        }
        count
    }
}

async fn remove_logged(job_id: &JobId, artifacts: &JobArtifacts) {
    if let Err(e) = artifacts.remove().await {
        metrics::record_cleanup_failure();
        warn!(
            job_id = %job_id,
            dir = %artifacts.dir().display(),
            "Failed to remove job artifacts: {}", e
        );
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        for (_, entry) in self.pending.lock().drain() {
            entry.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn populated(root: &std::path::Path) -> (JobId, JobArtifacts) {
        let job_id = JobId::new();
        let artifacts = JobArtifacts::new(root, &job_id);
        artifacts.create().await.unwrap();
        tokio::fs::write(artifacts.transcode_output(), b"mp4").await.unwrap();
        (job_id, artifacts)
    }

    #[tokio::test]
    async fn test_removes_after_grace() {
        let root = tempfile::tempdir().unwrap();
        let (job_id, artifacts) = populated(root.path()).await;
        let scheduler = CleanupScheduler::new(Duration::from_millis(50));

        scheduler.schedule(job_id, artifacts.clone());
        assert!(artifacts.dir().exists());
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!artifacts.dir().exists());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_immediately() {
        let root = tempfile::tempdir().unwrap();
        let (job_id, artifacts) = populated(root.path()).await;
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        scheduler.schedule(job_id, artifacts.clone());
        assert_eq!(scheduler.shutdown().await, 1);
        assert!(!artifacts.dir().exists());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_release_after_shutdown_deletes_now() {
        let root = tempfile::tempdir().unwrap();
        let (job_id, artifacts) = populated(root.path()).await;
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        assert_eq!(scheduler.shutdown().await, 0);
        assert!(scheduler.is_closed());

        scheduler.release(job_id, artifacts.clone()).await;
        assert!(!artifacts.dir().exists());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_release_before_shutdown_waits_for_grace() {
        let root = tempfile::tempdir().unwrap();
        let (job_id, artifacts) = populated(root.path()).await;
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        scheduler.release(job_id, artifacts.clone()).await;
        assert!(artifacts.dir().exists());
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::new();
        let artifacts = JobArtifacts::new(root.path(), &job_id);
        let scheduler = CleanupScheduler::new(Duration::ZERO);

        scheduler.schedule(job_id, artifacts);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.pending_count(), 0);
    }
}
