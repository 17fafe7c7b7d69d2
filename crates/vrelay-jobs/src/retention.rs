//! Retention policy for finished jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::table::JobTable;

const EVICTED_TOTAL: &str = "vrelay_jobs_evicted_total";

/// How long finished jobs stay queryable.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Terminal jobs older than this (since their last update) are evicted
    pub ttl: Duration,
    /// Maximum number of terminal jobs kept; oldest-finished go first
    pub max_terminal: usize,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_terminal: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RetentionPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        Self {
            ttl: Duration::from_secs(
                std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            max_terminal: std::env::var("JOB_RETENTION_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            sweep_interval: Duration::from_secs(
                std::env::var("JOB_RETENTION_SWEEP_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60)
                    .max(1),
            ),
        }
    }

    /// Evict expired and excess terminal jobs. Returns how many were removed.
    pub fn sweep(&self, table: &JobTable, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let finished = table.terminal_jobs();
        let total = finished.len();
        let excess = total.saturating_sub(self.max_terminal);

        let mut evicted = 0;
        for (index, (id, finished_at)) in finished.into_iter().enumerate() {
            let expired = now - finished_at >= ttl;
            if (expired || index < excess) && table.evict(&id) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            metrics::counter!(EVICTED_TOTAL).increment(evicted as u64);
            debug!(evicted, remaining = table.len(), "Swept finished jobs");
        }
        evicted
    }
}

/// Run [`RetentionPolicy::sweep`] periodically until `shutdown` flips to true.
pub fn spawn_sweeper(
    table: Arc<JobTable>,
    policy: RetentionPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting job retention sweeper (ttl {:?}, max {} finished jobs)",
            policy.ttl, policy.max_terminal
        );
        let mut interval = tokio::time::interval(policy.sweep_interval);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    policy.sweep(&table, Utc::now());
                }
            }
        }
        debug!("Job retention sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrelay_models::{Job, JobId};

    fn finished(table: &JobTable) -> JobId {
        let id = table.insert(Job::new("ref", "chat"));
        table.update(&id, |job| job.fail("done")).unwrap();
        id
    }

    fn policy(ttl_secs: u64, max_terminal: usize) -> RetentionPolicy {
        RetentionPolicy {
            ttl: Duration::from_secs(ttl_secs),
            max_terminal,
            sweep_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_expired_terminal_jobs_are_evicted() {
        let table = JobTable::default();
        let running = table.insert(Job::new("ref", "chat"));
        let done = finished(&table);

        assert_eq!(policy(60, 100).sweep(&table, Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(policy(60, 100).sweep(&table, later), 1);
        assert!(!table.contains(&done));
        assert!(table.contains(&running));
    }

    #[test]
    fn test_excess_terminal_jobs_evicted_oldest_first() {
        let table = JobTable::default();
        let first = finished(&table);
        std::thread::sleep(Duration::from_millis(5));
        let second = finished(&table);
        std::thread::sleep(Duration::from_millis(5));
        let third = finished(&table);

        assert_eq!(policy(3600, 2).sweep(&table, Utc::now()), 1);
        assert!(!table.contains(&first));
        assert!(table.contains(&second));
        assert!(table.contains(&third));
    }

    #[test]
    fn test_running_jobs_are_never_evicted() {
        let table = JobTable::default();
        for _ in 0..3 {
            table.insert(Job::new("ref", "chat"));
        }
        let far_future = Utc::now() + chrono::Duration::days(30);
        assert_eq!(policy(1, 0).sweep(&table, far_future), 0);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let table = Arc::new(JobTable::default());
        finished(&table);
        let (tx, rx) = watch::channel(false);

        let handle = spawn_sweeper(table.clone(), policy(0, 100), rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(table.is_empty());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
