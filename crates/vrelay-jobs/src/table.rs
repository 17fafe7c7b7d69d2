//! In-memory job table.
//!
//! The outer map lock is only held long enough to find, insert or remove an
//! entry. Mutations lock a single job, so a status poll never waits on
//! another job's pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use vrelay_models::{Job, JobId, JobSnapshot, JobStateError, JobStatus};

use crate::error::{TableError, TableResult};
use crate::progress::{ProgressChannel, ProgressEvent, ProgressStream};

/// Owner of every live job record. Only snapshot copies leave it.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
    progress: ProgressChannel,
}

impl JobTable {
    pub fn new(progress: ProgressChannel) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    /// Stream one job's transitions.
    ///
    /// If the subscriber falls behind the shared buffer, the job is re-read
    /// from the table so a missed terminal event still ends the stream.
    pub fn subscribe_job(self: &Arc<Self>, id: &JobId) -> ProgressStream {
        let table: Weak<Self> = Arc::downgrade(self);
        self.progress.subscribe_job_with(
            id,
            Arc::new(move |id: &JobId| {
                let table = table.upgrade()?;
                let snapshot = table.snapshot(id).ok()?;
                Some(ProgressEvent::from_job(&snapshot.job))
            }),
        )
    }

    /// Store a new job and publish its initial state.
    pub fn insert(&self, job: Job) -> JobId {
        let id = job.id.clone();
        let event = ProgressEvent::from_job(&job);
        self.jobs.write().insert(id.clone(), Arc::new(Mutex::new(job)));
        self.progress.publish(event);
        id
    }

    fn entry(&self, id: &JobId) -> TableResult<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TableError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.read().contains_key(id)
    }

    /// Copy a job with its age at the time of the call.
    pub fn snapshot(&self, id: &JobId) -> TableResult<JobSnapshot> {
        let entry = self.entry(id)?;
        let job = entry.lock();
        Ok(JobSnapshot::capture(&job, Utc::now()))
    }

    /// Apply a mutation to one job.
    ///
    /// On success the new state is published while the job is still locked,
    /// so subscribers see transitions in the order they were applied. A
    /// rejected mutation leaves the job untouched and publishes nothing.
    pub fn update<F, T>(&self, id: &JobId, f: F) -> TableResult<T>
    where
        F: FnOnce(&mut Job) -> Result<T, JobStateError>,
    {
        let entry = self.entry(id)?;
        let mut job = entry.lock();
        let mut draft = job.clone();
        let out = f(&mut draft)?;
        *job = draft;
        self.progress.publish(ProgressEvent::from_job(&job));
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Number of jobs per status.
    pub fn status_counts(&self) -> HashMap<JobStatus, usize> {
        let entries: Vec<_> = self.jobs.read().values().cloned().collect();
        let mut counts = HashMap::new();
        for entry in entries {
            *counts.entry(entry.lock().status).or_insert(0) += 1;
        }
        counts
    }

    /// Remove a terminal job. Running jobs are never evicted.
    pub fn evict(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.write();
        let terminal = jobs.get(id).map(|entry| entry.lock().is_terminal());
        if terminal == Some(true) {
            jobs.remove(id);
            debug!(job_id = %id, "Evicted job");
            true
        } else {
            false
        }
    }

    /// Terminal jobs with the time they finished, oldest first.
    pub fn terminal_jobs(&self) -> Vec<(JobId, DateTime<Utc>)> {
        let entries: Vec<_> = self
            .jobs
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        let mut finished: Vec<_> = entries
            .into_iter()
            .filter_map(|(id, entry)| {
                let job = entry.lock();
                job.is_terminal().then(|| (id, job.updated_at))
            })
            .collect();
        finished.sort_by_key(|(_, at)| *at);
        finished
    }
}
