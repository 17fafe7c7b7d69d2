//! FFmpeg-based transcoding collaborator.
//!
//! This crate provides:
//! - An FFmpeg command builder and runner with progress, timeout and cancellation
//! - FFprobe metadata extraction
//! - Streaming (fast-start MP4) transcodes and thumbnail extraction
//! - The [`Transcoder`] trait consumed by the job orchestrator

pub mod command;
pub mod error;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod transcode;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use thumbnail::generate_thumbnail;
pub use transcode::{is_streaming_ready, transcode_for_streaming};
pub use transcoder::{FfmpegTranscoder, Transcoder};
