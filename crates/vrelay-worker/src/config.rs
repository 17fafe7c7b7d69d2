//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use vrelay_models::{QualityPreset, StreamingPolicy, ThumbnailOffset, ThumbnailSize};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum pipelines running at once
    pub max_concurrent_jobs: usize,
    /// Root for per-job working directories
    pub work_dir: PathBuf,
    /// Budget for each collaborator call
    pub step_timeout: Duration,
    /// Delay before a finished job's files are removed
    pub cleanup_grace: Duration,
    /// How long shutdown waits for running jobs to settle
    pub shutdown_timeout: Duration,
    /// Re-encode settings
    pub streaming: StreamingPolicy,
    pub thumbnail_offset: ThumbnailOffset,
    pub thumbnail_size: ThumbnailSize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: std::env::temp_dir().join("vrelay"),
            step_timeout: Duration::from_secs(1800), // 30 minutes
            cleanup_grace: Duration::from_secs(300),
            shutdown_timeout: Duration::from_secs(30),
            streaming: StreamingPolicy::default(),
            thumbnail_offset: ThumbnailOffset::default(),
            thumbnail_size: ThumbnailSize::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_dir = std::env::var("WORKER_WORK_DIR")
            .or_else(|_| std::env::var("TEMP_DIR"))
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        let secs = |name: &str, default: Duration| {
            parse_env::<u64>(name).map(Duration::from_secs).unwrap_or(default)
        };

        Self {
            max_concurrent_jobs: parse_env::<usize>("WORKER_MAX_JOBS")
                .unwrap_or(defaults.max_concurrent_jobs)
                .max(1),
            work_dir,
            step_timeout: secs("WORKER_STEP_TIMEOUT_SECS", defaults.step_timeout),
            cleanup_grace: secs("WORKER_CLEANUP_GRACE_SECS", defaults.cleanup_grace),
            shutdown_timeout: secs("WORKER_SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout),
            streaming: StreamingPolicy::default()
                .with_quality(parse_env::<QualityPreset>("VIDEO_QUALITY").unwrap_or_default()),
            thumbnail_offset: parse_env("THUMBNAIL_OFFSET").unwrap_or_default(),
            thumbnail_size: parse_env("THUMBNAIL_SIZE").unwrap_or_default(),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }
}

/// Parse an optional variable, ignoring (with a warning) values that don't parse.
fn parse_env<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.step_timeout, Duration::from_secs(1800));
        assert_eq!(config.cleanup_grace, Duration::from_secs(300));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.thumbnail_size.to_string(), "320x240");
    }

    #[test]
    fn test_builders_clamp_concurrency() {
        let config = WorkerConfig::default()
            .with_max_concurrent_jobs(0)
            .with_work_dir("/tmp/x");
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/x"));
    }
}
