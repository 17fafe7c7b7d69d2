//! In-process fake collaborators for orchestrator tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use vrelay_delivery::{Deliverer, DeliveryError, DeliveryResult};
use vrelay_jobs::JobTable;
use vrelay_media::{FfmpegProgress, MediaError, MediaResult, ProgressCallback, Transcoder, VideoInfo};
use vrelay_models::{
    DeliveryMode, DeliveryOptions, DeliveryReceipt, JobId, JobSnapshot, ObjectInfo, StreamingPolicy,
    ThumbnailOffset, ThumbnailSize,
};
use vrelay_storage::{download_path, SourceStore, StorageError, StorageResult};
use vrelay_worker::{Collaborators, Orchestrator, WorkerConfig};

pub const PROBED_DURATION: f64 = 12.5;

/// Serves `valid-ref-*` references; everything else is not found.
#[derive(Default)]
pub struct FakeStore {
    pub fetched: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SourceStore for FakeStore {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        if !reference.starts_with("valid-ref") {
            return Err(StorageError::not_found(reference));
        }
        Ok(ObjectInfo::new(reference, format!("{} <holiday>.mp4", reference))
            .with_size(2048)
            .with_mime_type("video/mp4"))
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        let path = download_path(dir, &info.name, &info.mime_type);
        tokio::fs::write(&path, vec![1u8; info.size as usize]).await?;
        self.fetched.lock().push(path.clone());
        Ok(path)
    }
}

pub struct FakeTranscoder {
    pub needs_transcode: bool,
    pub transcode_delay: Duration,
    pub panic_on_thumbnail: bool,
    pub thumbnail_inputs: Mutex<Vec<PathBuf>>,
    pub transcodes: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self {
            needs_transcode: true,
            transcode_delay: Duration::ZERO,
            panic_on_thumbnail: false,
            thumbnail_inputs: Mutex::new(Vec::new()),
            transcodes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?
            .len();
        Ok(VideoInfo {
            duration: PROBED_DURATION,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".to_string(),
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            size,
            bitrate: 800_000,
            has_audio: true,
        })
    }

    async fn needs_transcode(&self, _path: &Path) -> bool {
        self.needs_transcode
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _policy: &StreamingPolicy,
        progress: ProgressCallback,
    ) -> MediaResult<PathBuf> {
        let total_ms = (PROBED_DURATION * 1000.0) as i64;
        for quarter in 1..=4 {
            tokio::time::sleep(self.transcode_delay / 4).await;
            progress(FfmpegProgress {
                out_time_ms: total_ms * quarter / 4,
                ..Default::default()
            });
        }
        let bytes = tokio::fs::read(input).await?;
        tokio::fs::write(output, bytes).await?;
        self.transcodes.lock().push((input.to_path_buf(), output.to_path_buf()));
        Ok(output.to_path_buf())
    }

    async fn thumbnail(
        &self,
        input: &Path,
        output: &Path,
        _offset: ThumbnailOffset,
        _size: ThumbnailSize,
    ) -> MediaResult<PathBuf> {
        if self.panic_on_thumbnail {
            panic!("thumbnail decoder crashed");
        }
        self.thumbnail_inputs.lock().push(input.to_path_buf());
        tokio::fs::write(output, b"jpeg").await?;
        Ok(output.to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub media: PathBuf,
    pub destination: String,
    pub options: DeliveryOptions,
}

/// Streams files up to `max_file_size`, larger ones go out as documents.
pub struct FakeDeliverer {
    pub max_file_size: u64,
    pub fail_notifications: bool,
    pub deliveries: Mutex<Vec<Delivery>>,
    pub notifications: Mutex<Vec<(String, String)>>,
}

impl Default for FakeDeliverer {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            fail_notifications: false,
            deliveries: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Deliverer for FakeDeliverer {
    async fn deliver(
        &self,
        media: &Path,
        destination: &str,
        options: &DeliveryOptions,
    ) -> DeliveryResult<DeliveryReceipt> {
        let size = tokio::fs::metadata(media).await?.len();
        let mode = if size > self.max_file_size {
            DeliveryMode::Document
        } else {
            DeliveryMode::Streaming
        };
        let mut deliveries = self.deliveries.lock();
        deliveries.push(Delivery {
            media: media.to_path_buf(),
            destination: destination.to_string(),
            options: options.clone(),
        });
        Ok(DeliveryReceipt {
            message_id: format!("msg-{}", deliveries.len()),
            chat_id: destination.to_string(),
            mode,
        })
    }

    async fn notify_failure(&self, destination: &str, message: &str) -> DeliveryResult<()> {
        self.notifications
            .lock()
            .push((destination.to_string(), message.to_string()));
        if self.fail_notifications {
            return Err(DeliveryError::bad_request("chat not found"));
        }
        Ok(())
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<FakeStore>,
    pub transcoder: Arc<FakeTranscoder>,
    pub deliverer: Arc<FakeDeliverer>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(transcoder: FakeTranscoder, deliverer: FakeDeliverer) -> Self {
        Self::with_config(transcoder, deliverer, |config| config)
    }

    pub fn with_config(
        transcoder: FakeTranscoder,
        deliverer: FakeDeliverer,
        configure: impl FnOnce(WorkerConfig) -> WorkerConfig,
    ) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let transcoder = Arc::new(transcoder);
        let deliverer = Arc::new(deliverer);

        let config = configure(
            WorkerConfig::default()
                .with_work_dir(work_dir.path())
                .with_cleanup_grace(Duration::from_secs(3600)),
        );
        let collaborators = Collaborators {
            storage: store.clone(),
            transcoder: transcoder.clone(),
            deliverer: deliverer.clone(),
        };
        let orchestrator = Orchestrator::new(collaborators, Arc::new(JobTable::default()), config);

        Self {
            orchestrator,
            store,
            transcoder,
            deliverer,
            work_dir,
        }
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.work_dir.path().join(job_id.as_str())
    }

    /// Poll until the job is terminal, returning every observed snapshot.
    pub async fn wait_terminal(&self, job_id: &JobId) -> Vec<JobSnapshot> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = self.orchestrator.get_status(job_id).unwrap();
            let done = snapshot.job.is_terminal();
            seen.push(snapshot);
            if done {
                return seen;
            }
            assert!(tokio::time::Instant::now() < deadline, "job {} never finished", job_id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
