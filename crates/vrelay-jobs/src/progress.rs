//! Progress events via an in-process broadcast channel.

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use vrelay_models::{Job, JobId, JobStatus};

/// Default number of buffered events before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Pinned stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Looks up a job's current state after a subscriber lagged.
///
/// `None` means the job no longer exists.
pub type Resync = Arc<dyn Fn(&JobId) -> Option<ProgressEvent> + Send + Sync>;

/// A job transition pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Capture the current state of a job.
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            at: job.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Channel for publishing/subscribing to progress events.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("No progress subscribers");
        }
    }

    /// Subscribe to events for every job.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribe to progress events for a job.
    ///
    /// The stream ends after the job's terminal event or when the channel
    /// closes. Events dropped because the subscriber lagged are skipped, so
    /// a lagging subscriber can miss the terminal event; use
    /// [`ProgressChannel::subscribe_job_with`] when that matters.
    pub fn subscribe_job(&self, job_id: &JobId) -> ProgressStream {
        self.job_stream(job_id, None)
    }

    /// Like [`ProgressChannel::subscribe_job`], but after a lag `resync` is
    /// asked for the job's current state. A terminal state is yielded and
    /// ends the stream, as does a job that no longer exists.
    pub fn subscribe_job_with(&self, job_id: &JobId, resync: Resync) -> ProgressStream {
        self.job_stream(job_id, Some(resync))
    }

    fn job_stream(&self, job_id: &JobId, resync: Option<Resync>) -> ProgressStream {
        let receiver = self.sender.subscribe();
        let job_id = job_id.clone();

        let stream = futures_util::stream::unfold(
            (receiver, job_id, resync, false),
            |(mut receiver, job_id, resync, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.job_id == job_id => {
                            let terminal = event.is_terminal();
                            return Some((event, (receiver, job_id, resync, terminal)));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(job_id = %job_id, skipped, "Progress subscriber lagged");
                            let Some(lookup) = &resync else { continue };
                            match lookup(&job_id) {
                                Some(current) if current.is_terminal() => {
                                    return Some((current, (receiver, job_id, resync, true)));
                                }
                                Some(_) => continue,
                                None => return None,
                            }
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );

        Box::pin(stream)
    }
}
