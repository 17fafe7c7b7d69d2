//! Streaming encode policy and thumbnail settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Peak bitrate cap
pub const DEFAULT_MAXRATE: &str = "2M";
/// Rate-control buffer paired with the cap
pub const DEFAULT_BUFSIZE: &str = "4M";
/// Target container
pub const TARGET_FORMAT: &str = "mp4";

/// Thumbnail generation settings
pub const DEFAULT_THUMBNAIL_OFFSET_SECS: f64 = 5.0;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 240;

/// Output resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    /// Keep the source resolution
    #[default]
    #[serde(rename = "original")]
    Original,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Sd480 => "480p",
            QualityPreset::Hd720 => "720p",
            QualityPreset::Hd1080 => "1080p",
            QualityPreset::Original => "original",
        }
    }

    /// Maximum output height, `None` for the source resolution.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            QualityPreset::Sd480 => Some(480),
            QualityPreset::Hd720 => Some(720),
            QualityPreset::Hd1080 => Some(1080),
            QualityPreset::Original => None,
        }
    }

    /// Scale filter that only ever shrinks, keeping an even width.
    pub fn scale_filter(&self) -> Option<String> {
        self.max_height()
            .map(|h| format!("scale=-2:'min({},ih)'", h))
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" | "480" | "sd" => Ok(QualityPreset::Sd480),
            "720p" | "720" | "hd" => Ok(QualityPreset::Hd720),
            "1080p" | "1080" | "fullhd" => Ok(QualityPreset::Hd1080),
            "original" | "source" | "" => Ok(QualityPreset::Original),
            other => Err(format!("Unknown quality preset: {}", other)),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed re-encode policy for streaming-friendly output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingPolicy {
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u8,
    pub maxrate: String,
    pub bufsize: String,
    /// Move the index to the front of the file
    pub faststart: bool,
    pub quality: QualityPreset,
}

impl Default for StreamingPolicy {
    fn default() -> Self {
        Self {
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            maxrate: DEFAULT_MAXRATE.to_string(),
            bufsize: DEFAULT_BUFSIZE.to_string(),
            faststart: true,
            quality: QualityPreset::default(),
        }
    }
}

impl StreamingPolicy {
    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-maxrate".to_string(),
            self.maxrate.clone(),
            "-bufsize".to_string(),
            self.bufsize.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ];
        if let Some(filter) = self.quality.scale_filter() {
            args.push("-vf".to_string());
            args.push(filter);
        }
        args.push("-c:a".to_string());
        args.push(self.audio_codec.clone());
        if self.faststart {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
        args.push("-f".to_string());
        args.push(TARGET_FORMAT.to_string());
        args
    }
}

/// Where in the video the thumbnail frame is taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ThumbnailOffset {
    /// Absolute position in seconds
    Seconds(f64),
    /// Percentage of the total duration
    Percent(f64),
}

impl Default for ThumbnailOffset {
    fn default() -> Self {
        ThumbnailOffset::Seconds(DEFAULT_THUMBNAIL_OFFSET_SECS)
    }
}

impl ThumbnailOffset {
    /// Seek position in seconds for a video of `duration` seconds.
    ///
    /// Offsets past the end fall back to the midpoint. An unknown
    /// (zero) duration keeps absolute offsets and maps percentages to 0.
    pub fn resolve(&self, duration: f64) -> f64 {
        let known = duration.is_finite() && duration > 0.0;
        let position = match *self {
            ThumbnailOffset::Seconds(s) => s.max(0.0),
            ThumbnailOffset::Percent(p) if known => duration * p.clamp(0.0, 100.0) / 100.0,
            ThumbnailOffset::Percent(_) => 0.0,
        };
        if known && position >= duration {
            duration / 2.0
        } else {
            position
        }
    }
}

impl FromStr for ThumbnailOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value: f64 = pct
                .trim()
                .parse()
                .map_err(|_| format!("Invalid thumbnail percentage: {}", s))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("Thumbnail percentage out of range: {}", s));
            }
            return Ok(ThumbnailOffset::Percent(value));
        }
        let secs = s.strip_suffix('s').unwrap_or(s).trim();
        let value: f64 = secs
            .parse()
            .map_err(|_| format!("Invalid thumbnail offset: {}", s))?;
        if value < 0.0 || !value.is_finite() {
            return Err(format!("Invalid thumbnail offset: {}", s));
        }
        Ok(ThumbnailOffset::Seconds(value))
    }
}

/// Target thumbnail dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_THUMBNAIL_WIDTH,
            height: DEFAULT_THUMBNAIL_HEIGHT,
        }
    }
}

impl ThumbnailSize {
    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

impl FromStr for ThumbnailSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid thumbnail size: {}", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("Invalid thumbnail width: {}", s))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("Invalid thumbnail height: {}", s))?;
        if width == 0 || height == 0 {
            return Err(format!("Thumbnail size must be non-zero: {}", s));
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
