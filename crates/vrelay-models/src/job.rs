//! Job record, status machine and result payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::delivery::DeliveryReceipt;
use crate::utils::single_line;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline status of a job.
///
/// Statuses advance in declaration order. `Transcoding` may be skipped,
/// and any non-terminal status may jump straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a pipeline slot
    #[default]
    Queued,
    /// Resolving and downloading the source object
    Fetching,
    /// Probing the downloaded file
    Analyzing,
    /// Re-encoding into the streaming format
    Transcoding,
    /// Extracting the preview frame
    GeneratingThumbnail,
    /// Uploading to the destination
    Delivering,
    /// Delivered successfully
    Completed,
    /// Stopped with an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Fetching => "fetching",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Transcoding => "transcoding",
            JobStatus::GeneratingThumbnail => "generating_thumbnail",
            JobStatus::Delivering => "delivering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Progress value a job reports on entering this status.
    pub fn base_progress(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Fetching => 10,
            JobStatus::Analyzing => 30,
            JobStatus::Transcoding => 50,
            JobStatus::GeneratingThumbnail => 70,
            JobStatus::Delivering => 90,
            JobStatus::Completed | JobStatus::Failed => 100,
        }
    }

    /// Highest progress reachable without leaving this status.
    pub fn progress_ceiling(&self) -> u8 {
        match self {
            JobStatus::Queued => 9,
            JobStatus::Fetching => 29,
            JobStatus::Analyzing => 49,
            JobStatus::Transcoding => 69,
            JobStatus::GeneratingThumbnail => 89,
            JobStatus::Delivering => 99,
            JobStatus::Completed | JobStatus::Failed => 100,
        }
    }

    /// Human-readable description shown while the job sits in this status.
    pub fn default_message(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Waiting to start...",
            JobStatus::Fetching => "Downloading video...",
            JobStatus::Analyzing => "Analyzing video format...",
            JobStatus::Transcoding => "Processing video for streaming...",
            JobStatus::GeneratingThumbnail => "Generating thumbnail...",
            JobStatus::Delivering => "Sending to destination...",
            JobStatus::Completed => "Video sent successfully!",
            JobStatus::Failed => "Processing failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Failed {
            return true;
        }
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Fetching)
                | (JobStatus::Fetching, JobStatus::Analyzing)
                | (JobStatus::Analyzing, JobStatus::Transcoding)
                | (JobStatus::Analyzing, JobStatus::GeneratingThumbnail)
                | (JobStatus::Transcoding, JobStatus::GeneratingThumbnail)
                | (JobStatus::GeneratingThumbnail, JobStatus::Delivering)
                | (JobStatus::Delivering, JobStatus::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected job mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStateError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job is already {0}")]
    Terminal(JobStatus),
}

/// Summary of the delivered media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSummary {
    /// Source object name
    pub name: String,
    /// Delivered file size in bytes
    pub size: u64,
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// "WIDTHxHEIGHT"
    pub resolution: String,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Whether the file was re-encoded
    pub transcoded: bool,
}

/// Payload recorded on a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub receipt: DeliveryReceipt,
    pub media: MediaSummary,
    /// Wall-clock time from submission to delivery
    pub elapsed_ms: u64,
}

/// A unit of orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// 0-100, never decreases
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source_ref: String,
    pub destination: String,
}

impl Job {
    /// Allocate a new queued job.
    pub fn new(source_ref: impl Into<String>, destination: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            progress: 0,
            message: JobStatus::Queued.default_message().to_string(),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            source_ref: source_ref.into(),
            destination: destination.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to the next pipeline status.
    pub fn advance(&mut self, next: JobStatus, message: impl Into<String>) -> Result<(), JobStateError> {
        self.check_transition(next)?;
        if next.is_terminal() {
            // Terminal statuses carry payloads; use complete()/fail().
            return Err(JobStateError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.progress = self.progress.max(next.base_progress());
        self.message = message.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record sub-step progress within the current status.
    ///
    /// The value is clamped to the status ceiling and never lowers the
    /// current progress.
    pub fn report_progress(&mut self, progress: u8, message: Option<String>) -> Result<(), JobStateError> {
        if self.is_terminal() {
            return Err(JobStateError::Terminal(self.status));
        }
        let capped = progress.min(self.status.progress_ceiling());
        self.progress = self.progress.max(capped);
        if let Some(message) = message {
            self.message = message;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job as delivered.
    pub fn complete(&mut self, result: JobResult) -> Result<(), JobStateError> {
        self.check_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = JobStatus::Completed.default_message().to_string();
        self.result = Some(result);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job as failed. The error is collapsed onto a single line.
    pub fn fail(&mut self, error: impl AsRef<str>) -> Result<(), JobStateError> {
        self.check_transition(JobStatus::Failed)?;
        let error = single_line(error.as_ref());
        self.status = JobStatus::Failed;
        self.progress = 100;
        self.message = error.clone();
        self.error = Some(error);
        self.result = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn check_transition(&self, next: JobStatus) -> Result<(), JobStateError> {
        if self.is_terminal() {
            return Err(JobStateError::Terminal(self.status));
        }
        if !self.status.can_transition_to(next) {
            return Err(JobStateError::InvalidTransition { from: self.status, to: next });
        }
        Ok(())
    }
}

/// Immutable copy of a job handed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub job: Job,
    /// Milliseconds since the job was created
    pub duration: i64,
}

impl JobSnapshot {
    /// Copy a job and derive its age at `now`.
    pub fn capture(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            job: job.clone(),
            duration: (now - job.created_at).num_milliseconds().max(0),
        }
    }
}
