//! Streaming transcode.

use std::path::Path;

use tracing::info;
use vrelay_models::encoding::TARGET_FORMAT;
use vrelay_models::StreamingPolicy;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::VideoInfo;
use crate::progress::FfmpegProgress;

/// Whether a probed file can be delivered without re-encoding.
///
/// Only an MP4 container with an `.mp4` extension qualifies.
pub fn is_streaming_ready(info: &VideoInfo, path: &Path) -> bool {
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(TARGET_FORMAT))
        .unwrap_or(false);
    ext_matches && info.container_is(TARGET_FORMAT)
}

/// Re-encode `input` into a fast-start MP4 at `output`.
pub async fn transcode_for_streaming<F>(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    policy: &StreamingPolicy,
    on_progress: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    info!(
        input = %input.display(),
        output = %output.display(),
        quality = %policy.quality,
        "Transcoding for streaming"
    );

    let cmd = FfmpegCommand::new(input, output)
        .map("0:v:0")
        .map("0:a:0?")
        .output_args(policy.to_ffmpeg_args());

    runner.run_with_progress(&cmd, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(format_name: &str) -> VideoInfo {
        VideoInfo {
            duration: 10.0,
            width: 640,
            height: 360,
            fps: 30.0,
            codec: "h264".into(),
            format_name: format_name.into(),
            size: 1,
            bitrate: 1,
            has_audio: true,
        }
    }

    #[test]
    fn test_mp4_is_streaming_ready() {
        assert!(is_streaming_ready(&info("mov,mp4,m4a,3gp,3g2,mj2"), Path::new("/w/a.mp4")));
        assert!(is_streaming_ready(&info("mov,mp4,m4a,3gp,3g2,mj2"), Path::new("/w/a.MP4")));
    }

    #[test]
    fn test_other_containers_need_transcode() {
        // QuickTime shares the mp4 demuxer name but keeps its extension.
        assert!(!is_streaming_ready(&info("mov,mp4,m4a,3gp,3g2,mj2"), Path::new("/w/a.mov")));
        assert!(!is_streaming_ready(&info("matroska,webm"), Path::new("/w/a.mp4")));
        assert!(!is_streaming_ready(&info("mov,mp4"), Path::new("/w/noext")));
    }
}
