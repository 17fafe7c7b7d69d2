//! Orchestrator metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vrelay_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vrelay_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vrelay_jobs_failed_total";
    pub const JOBS_RUNNING: &str = "vrelay_jobs_running";

    /// Submission-to-terminal time
    pub const JOB_DURATION_SECONDS: &str = "vrelay_job_duration_seconds";
    pub const STEP_DURATION_SECONDS: &str = "vrelay_step_duration_seconds";

    pub const CLEANUP_FAILURES_TOTAL: &str = "vrelay_cleanup_failures_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_completed(elapsed: Duration, transcoded: bool) {
    counter!(
        names::JOBS_COMPLETED_TOTAL,
        "transcoded" => if transcoded { "true" } else { "false" }
    )
    .increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => "completed").record(elapsed.as_secs_f64());
}

pub fn record_job_failed(kind: &'static str, elapsed: Duration) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => "failed").record(elapsed.as_secs_f64());
}

pub fn record_step(step: &'static str, success: bool, elapsed: Duration) {
    histogram!(
        names::STEP_DURATION_SECONDS,
        "step" => step,
        "status" => if success { "ok" } else { "error" }
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}

/// Keeps the running-jobs gauge raised while alive.
pub struct RunningJob(());

impl RunningJob {
    pub fn start() -> Self {
        gauge!(names::JOBS_RUNNING).increment(1.0);
        Self(())
    }
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        gauge!(names::JOBS_RUNNING).decrement(1.0);
    }
}
