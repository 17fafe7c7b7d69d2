//! Transcoding collaborator seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use vrelay_models::{StreamingPolicy, ThumbnailOffset, ThumbnailSize};

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_video_with, VideoInfo};
use crate::progress::ProgressCallback;
use crate::thumbnail::generate_thumbnail;
use crate::transcode::{is_streaming_ready, transcode_for_streaming};

/// Media operations the pipeline depends on.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read duration, dimensions, codec and bitrate.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Whether `path` must be re-encoded before delivery.
    ///
    /// Any probe failure counts as "yes".
    async fn needs_transcode(&self, path: &Path) -> bool {
        match self.probe(path).await {
            Ok(info) => !is_streaming_ready(&info, path),
            Err(e) => {
                debug!(path = %path.display(), "Probe failed, will transcode: {}", e);
                true
            }
        }
    }

    /// Re-encode `input` into `output` using `policy`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        policy: &StreamingPolicy,
        progress: ProgressCallback,
    ) -> MediaResult<PathBuf>;

    /// Extract a still frame.
    async fn thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset: ThumbnailOffset,
        size: ThumbnailSize,
    ) -> MediaResult<PathBuf>;
}

/// [`Transcoder`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegTranscoder {
    /// Locate the binaries via `FFMPEG_PATH`/`FFPROBE_PATH` or `PATH`.
    pub fn new() -> MediaResult<Self> {
        Ok(Self::with_binaries(check_ffmpeg()?, check_ffprobe()?))
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout_secs: None,
            cancel_rx: None,
        }
    }

    /// Kill encoder processes that run longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Kill running encoders when the signal flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new().with_binary(&self.ffmpeg);
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video_with(&self.ffprobe, path).await
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        policy: &StreamingPolicy,
        progress: ProgressCallback,
    ) -> MediaResult<PathBuf> {
        transcode_for_streaming(&self.runner(), input, output, policy, progress).await?;
        Ok(output.to_path_buf())
    }

    async fn thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset: ThumbnailOffset,
        size: ThumbnailSize,
    ) -> MediaResult<PathBuf> {
        let duration = match self.probe(input).await {
            Ok(info) => info.duration,
            Err(e) => {
                warn!(path = %input.display(), "Probe before thumbnail failed: {}", e);
                0.0
            }
        };
        let seek = offset.resolve(duration);
        generate_thumbnail(&self.runner(), input, output, seek, size).await?;
        Ok(output.to_path_buf())
    }
}
