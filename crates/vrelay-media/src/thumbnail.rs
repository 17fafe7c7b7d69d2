//! Thumbnail generation.

use std::path::Path;

use vrelay_models::ThumbnailSize;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extract one frame at `seek_secs`, scaled to `size`, as a JPEG.
pub async fn generate_thumbnail(
    runner: &FfmpegRunner,
    video_path: &Path,
    output_path: &Path,
    seek_secs: f64,
    size: ThumbnailSize,
) -> MediaResult<()> {
    let cmd = thumbnail_command(video_path, output_path, seek_secs, size);
    runner.run(&cmd).await?;

    // Seeking past the last frame exits cleanly without writing anything.
    match tokio::fs::metadata(output_path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(MediaError::ffmpeg_failed(
            format!("No frame extracted at {:.3}s", seek_secs),
            None,
            None,
        )),
    }
}

fn thumbnail_command(video_path: &Path, output_path: &Path, seek_secs: f64, size: ThumbnailSize) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .seek(seek_secs)
        .single_frame()
        .video_filter(size.scale_filter())
        .output_arg("-q:v")
        .output_arg("2")
        .log_level("error")
}
