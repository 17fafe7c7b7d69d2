//! Job orchestrator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use vrelay_jobs::{JobTable, ProgressStream};
use vrelay_models::{Job, JobId, JobSnapshot, ProcessRequest};

use crate::artifacts::JobArtifacts;
use crate::cleanup::CleanupScheduler;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLog;
use crate::metrics;
use crate::pipeline::{Collaborators, JobContext, Pipeline};

/// Accepts jobs and drives each one through the pipeline on its own task.
///
/// Cheap to clone; clones share the job table, permits and cleanup timers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    table: Arc<JobTable>,
    pipeline: Pipeline,
    permits: Arc<Semaphore>,
    cleanup: CleanupScheduler,
    config: WorkerConfig,
    /// Jobs whose supervisor has not yet released their artifacts
    in_flight: AtomicUsize,
    settled: Notify,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, table: Arc<JobTable>, config: WorkerConfig) -> Self {
        info!(
            "Creating orchestrator with {} max concurrent jobs, work dir {}",
            config.max_concurrent_jobs,
            config.work_dir.display()
        );
        let inner = Inner {
            pipeline: Pipeline::new(collaborators, Arc::clone(&table), config.clone()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            cleanup: CleanupScheduler::new(config.cleanup_grace),
            table,
            config,
            in_flight: AtomicUsize::new(0),
            settled: Notify::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn table(&self) -> &Arc<JobTable> {
        &self.inner.table
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Validate and enqueue a job, returning its id immediately.
    ///
    /// The job is visible as `queued` before this returns. The pipeline
    /// starts once one of the concurrency permits is free.
    pub fn submit(&self, request: ProcessRequest) -> WorkerResult<JobId> {
        request.validate().map_err(WorkerError::InvalidRequest)?;

        let job_id = self
            .inner
            .table
            .insert(Job::new(request.source_ref.trim(), request.destination.trim()));
        metrics::record_job_submitted();

        let ctx = JobContext {
            artifacts: JobArtifacts::new(&self.inner.config.work_dir, &job_id),
            log: JobLog::for_request(&job_id, &request),
            job_id: job_id.clone(),
            request,
            submitted: Instant::now(),
        };
        debug!(job_id = %job_id, "Job queued");

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let span = ctx.log.span();
        let worker = tokio::spawn(Arc::clone(&self.inner).run(ctx.clone()).instrument(span));
        tokio::spawn(Arc::clone(&self.inner).supervise(ctx, worker));

        Ok(job_id)
    }

    /// Copy of the job's current state.
    pub fn get_status(&self, job_id: &JobId) -> WorkerResult<JobSnapshot> {
        Ok(self.inner.table.snapshot(job_id)?)
    }

    /// Current state plus a stream of the job's later transitions.
    ///
    /// The stream is opened before the snapshot is taken, so no transition
    /// falls between the two. A terminal snapshot means the stream will
    /// yield nothing new.
    pub fn watch(&self, job_id: &JobId) -> WorkerResult<(JobSnapshot, ProgressStream)> {
        let stream = self.inner.table.subscribe_job(job_id);
        let snapshot = self.get_status(job_id)?;
        Ok((snapshot, stream))
    }

    /// Check the delivery backend.
    pub async fn health_check(&self) -> WorkerResult<()> {
        self.inner.pipeline.check_delivery().await
    }

    /// Jobs submitted but not yet settled (terminal with artifacts handed
    /// to cleanup).
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Stop admitting queued jobs, wait for running ones to settle, then
    /// delete every scheduled artifact directory.
    ///
    /// The wait is bounded by `shutdown_timeout`. Jobs still running after
    /// that keep their directories.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        info!(in_flight = self.in_flight(), "Shutting down orchestrator");
        inner.permits.close();

        let timeout = inner.config.shutdown_timeout;
        if tokio::time::timeout(timeout, inner.wait_settled()).await.is_err() {
            warn!(
                in_flight = self.in_flight(),
                "Jobs still running after {:?}, their artifacts are left in place", timeout
            );
        }

        inner.cleanup.shutdown().await;
    }
}

impl Inner {
    async fn wait_settled(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost.
            let notified = self.settled.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn run(self: Arc<Self>, ctx: JobContext) {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.fail(&ctx, WorkerError::internal("Worker is shutting down")).await;
                return;
            }
        };
        let _running = metrics::RunningJob::start();

        ctx.log.started(ctx.submitted.elapsed());

        match self.pipeline.run(&ctx).await {
            Ok(result) => {
                ctx.log.completed(&result);
                let transcoded = result.media.transcoded;
                match self.table.update(&ctx.job_id, |job| job.complete(result)) {
                    Ok(()) => metrics::record_job_completed(ctx.submitted.elapsed(), transcoded),
                    Err(e) => error!(job_id = %ctx.job_id, "Failed to record completion: {}", e),
                }
            }
            Err(e) => self.fail(&ctx, e).await,
        }
    }

    /// Wait for the pipeline task, catch panics, then release the artifacts.
    async fn supervise(self: Arc<Self>, ctx: JobContext, worker: JoinHandle<()>) {
        if let Err(e) = worker.await {
            let err = if e.is_panic() {
                WorkerError::internal("Pipeline task panicked")
            } else {
                WorkerError::internal("Pipeline task was cancelled")
            };
            self.fail(&ctx, err).await;
        }
        self.cleanup.release(ctx.job_id.clone(), ctx.artifacts.clone()).await;

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.settled.notify_waiters();
    }

    /// Record the failure, then tell the destination.
    ///
    /// The notification outcome never changes the stored error.
    async fn fail(&self, ctx: &JobContext, err: WorkerError) {
        ctx.log.failed(&err);
        let message = err.to_string();

        if let Err(e) = self.table.update(&ctx.job_id, |job| job.fail(&message)) {
            warn!(job_id = %ctx.job_id, "Failure not recorded: {}", e);
            return;
        }
        metrics::record_job_failed(err.kind(), ctx.submitted.elapsed());

        let stored = self
            .table
            .snapshot(&ctx.job_id)
            .ok()
            .and_then(|s| s.job.error)
            .unwrap_or(message);
        self.pipeline.notify_failure(ctx, &stored).await;
    }
}
