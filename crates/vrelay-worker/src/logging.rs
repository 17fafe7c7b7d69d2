//! Per-job log lines.
//!
//! Every line carries the job id. The source and destination live on the
//! job span. Source references can be presigned URLs, so their query
//! string is dropped before they reach a log line.

use std::time::Duration;

use tracing::{error, info, warn, Span};
use vrelay_models::{JobId, JobResult, JobStatus, ProcessRequest};

use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct JobLog {
    job_id: JobId,
    source: String,
    destination: String,
}

impl JobLog {
    pub fn for_request(job_id: &JobId, request: &ProcessRequest) -> Self {
        Self {
            job_id: job_id.clone(),
            source: redact_source(request.source_ref.trim()),
            destination: request.destination.trim().to_string(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Span wrapping the whole pipeline task.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            source = %self.source,
            destination = %self.destination
        )
    }

    pub fn started(&self, waited: Duration) {
        info!(
            job_id = %self.job_id,
            waited_ms = waited.as_millis() as u64,
            "Relaying {} to {}", self.source, self.destination
        );
    }

    pub fn entered(&self, status: JobStatus) {
        info!(
            job_id = %self.job_id,
            step = status.as_str(),
            "{}", status.default_message()
        );
    }

    /// Detail line inside a step.
    pub fn step(&self, step: &str, message: &str) {
        info!(job_id = %self.job_id, step = step, "{}", message);
    }

    pub fn completed(&self, result: &JobResult) {
        info!(
            job_id = %self.job_id,
            message_id = %result.receipt.message_id,
            mode = ?result.receipt.mode,
            transcoded = result.media.transcoded,
            elapsed_ms = result.elapsed_ms,
            "Delivered {} to {}", result.media.name, self.destination
        );
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(job_id = %self.job_id, kind = err.kind(), "Job failed: {}", err);
    }

    pub fn notice_not_sent(&self, reason: &str) {
        warn!(
            job_id = %self.job_id,
            destination = %self.destination,
            "Failure notification not sent: {}", reason
        );
    }
}

/// Drop the query and fragment of URL references.
fn redact_source(source_ref: &str) -> String {
    if !source_ref.contains("://") {
        return source_ref.to_string();
    }
    match source_ref.find(|c: char| c == '?' || c == '#') {
        Some(cut) => format!("{}?…", &source_ref[..cut]),
        None => source_ref.to_string(),
    }
}
