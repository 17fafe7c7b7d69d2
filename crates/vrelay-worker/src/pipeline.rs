//! The per-job pipeline.
//!
//! Steps run strictly in order on the job's task: fetch, analyze,
//! transcode (skipped for streaming-ready MP4), thumbnail, metadata probe,
//! deliver. Each collaborator call gets its own timeout. The first error
//! ends the run; recording the failure is the orchestrator's job.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use vrelay_delivery::{escape_html, Deliverer};
use vrelay_jobs::JobTable;
use vrelay_media::{FfmpegProgress, ProgressCallback, Transcoder};
use vrelay_models::{
    format_file_size, DeliveryOptions, JobId, JobResult, JobStatus, MediaSummary, ProcessRequest,
};
use vrelay_storage::SourceStore;

use crate::artifacts::JobArtifacts;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLog;
use crate::metrics;

/// The storage, media and delivery backends a pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn SourceStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub deliverer: Arc<dyn Deliverer>,
}

/// Everything one pipeline run needs to know about its job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub request: ProcessRequest,
    pub artifacts: JobArtifacts,
    pub log: JobLog,
    pub submitted: Instant,
}

pub struct Pipeline {
    collaborators: Collaborators,
    table: Arc<JobTable>,
    config: WorkerConfig,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, table: Arc<JobTable>, config: WorkerConfig) -> Self {
        Self {
            collaborators,
            table,
            config,
        }
    }

    /// Drive one job from `queued` up to a delivery receipt.
    pub async fn run(&self, ctx: &JobContext) -> WorkerResult<JobResult> {
        let JobContext {
            job_id,
            request,
            artifacts,
            log,
            ..
        } = ctx;
        let Collaborators {
            storage,
            transcoder,
            deliverer,
        } = &self.collaborators;

        artifacts.create().await?;

        // Fetch
        self.enter(ctx, JobStatus::Fetching)?;
        let object = self.step("resolve", storage.resolve(&request.source_ref)).await?;
        self.table.update(job_id, |job| {
            job.report_progress(15, Some(format!("Downloading {}...", object.name)))
        })?;
        let source = self.step("fetch", storage.fetch(&object, artifacts.dir())).await?;
        log.step(
            "fetch",
            &format!("Fetched {} ({})", object.name, format_file_size(file_size(&source).await)),
        );

        // Analyze
        self.enter(ctx, JobStatus::Analyzing)?;
        let needs_transcode = self
            .step("analyze", async { Ok::<_, WorkerError>(transcoder.needs_transcode(&source).await) })
            .await?;

        let media = if needs_transcode {
            self.enter(ctx, JobStatus::Transcoding)?;
            let duration = self
                .step("analyze", async {
                    Ok::<_, WorkerError>(transcoder.probe(&source).await.map(|i| i.duration).unwrap_or(0.0))
                })
                .await?;
            let progress = self.transcode_progress(job_id, duration);
            self.step(
                "transcode",
                transcoder.transcode(&source, &artifacts.transcode_output(), &self.config.streaming, progress),
            )
            .await?
        } else {
            log.step("analyze", "Source is already streaming-ready, skipping transcode");
            source.clone()
        };

        // Thumbnail
        self.enter(ctx, JobStatus::GeneratingThumbnail)?;
        let thumbnail = self
            .step(
                "thumbnail",
                transcoder.thumbnail(
                    &media,
                    &artifacts.thumbnail(),
                    self.config.thumbnail_offset,
                    self.config.thumbnail_size,
                ),
            )
            .await?;

        // Metadata of what is actually delivered
        let info = self.step("probe", transcoder.probe(&media)).await?;
        let size = match file_size(&media).await {
            0 => info.size,
            n => n,
        };

        // Deliver
        self.enter(ctx, JobStatus::Delivering)?;
        let caption = request
            .caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| escape_html(&object.name));
        let options = DeliveryOptions {
            caption: Some(caption),
            controls: request.controls.clone(),
            thumbnail: Some(thumbnail),
            duration: Some(info.duration.max(0.0).round() as u32),
            width: Some(info.width).filter(|w| *w > 0),
            height: Some(info.height).filter(|h| *h > 0),
        };
        let receipt = self
            .step("deliver", deliverer.deliver(&media, &request.destination, &options))
            .await?;

        Ok(JobResult {
            receipt,
            media: MediaSummary {
                name: object.name,
                size,
                duration: info.duration,
                width: info.width,
                height: info.height,
                resolution: info.resolution(),
                bitrate: info.bitrate,
                transcoded: needs_transcode,
            },
            elapsed_ms: ctx.submitted.elapsed().as_millis() as u64,
        })
    }

    /// Best-effort failure notice to the destination. Errors are logged only.
    pub async fn notify_failure(&self, ctx: &JobContext, message: &str) {
        let notify = self
            .collaborators
            .deliverer
            .notify_failure(&ctx.request.destination, message);
        match tokio::time::timeout(self.config.step_timeout, notify).await {
            Ok(Ok(())) => debug!(job_id = %ctx.job_id, "Failure notification sent"),
            Ok(Err(e)) => ctx.log.notice_not_sent(&e.to_string()),
            Err(_) => ctx.log.notice_not_sent("timed out"),
        }
    }

    /// Verify the delivery backend is reachable.
    pub async fn check_delivery(&self) -> WorkerResult<()> {
        Ok(self.collaborators.deliverer.health_check().await?)
    }

    fn enter(&self, ctx: &JobContext, status: JobStatus) -> WorkerResult<()> {
        self.table
            .update(&ctx.job_id, |job| job.advance(status, status.default_message()))?;
        ctx.log.entered(status);
        Ok(())
    }

    /// Run one collaborator call under the step timeout.
    async fn step<T, E, F>(&self, step: &'static str, fut: F) -> WorkerResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<WorkerError>,
    {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.config.step_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(WorkerError::timeout(step, self.config.step_timeout)),
        };
        metrics::record_step(step, outcome.is_ok(), started.elapsed());
        outcome
    }

    /// Map encoder progress onto the transcoding band of the job.
    fn transcode_progress(&self, job_id: &JobId, duration_secs: f64) -> ProgressCallback {
        let table = Arc::clone(&self.table);
        let job_id = job_id.clone();
        let total_ms = (duration_secs * 1000.0) as i64;
        let base = JobStatus::Transcoding.base_progress();
        let band = JobStatus::Transcoding.progress_ceiling() - base;
        let last = AtomicU8::new(base);

        Box::new(move |progress: FfmpegProgress| {
            let pct = progress.percentage(total_ms);
            let value = base + ((pct / 100.0) * f64::from(band)).floor() as u8;
            if value <= last.load(Ordering::Relaxed) {
                return;
            }
            last.store(value, Ordering::Relaxed);

            let message = format!("Processing video for streaming... {:.0}%", pct);
            let result = table.update(&job_id, |job| {
                // Late encoder output must not touch a later step.
                if job.status != JobStatus::Transcoding {
                    return Ok(());
                }
                job.report_progress(value, Some(message))
            });
            if let Err(e) = result {
                warn!(job_id = %job_id, "Dropped transcode progress: {}", e);
            }
        })
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}
