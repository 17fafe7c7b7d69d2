//! S3-compatible object source.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::DateTimeFormat;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use vrelay_models::ObjectInfo;

use crate::download::{download_path, ensure_dir, remove_partial};
use crate::error::{StorageError, StorageResult};
use crate::metrics::{record_bytes_downloaded, record_request};
use crate::reference::SourceRef;
use crate::store::SourceStore;

const BACKEND: &str = "s3";

/// Configuration for S3-compatible storage.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint (R2, MinIO); AWS when unset
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

/// S3-compatible source backend.
#[derive(Clone)]
pub struct S3Source {
    client: Client,
}

impl S3Source {
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vrelay",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    fn location(reference: &str) -> StorageResult<(String, String)> {
        match SourceRef::parse(reference)? {
            SourceRef::S3 { bucket, key } => Ok((bucket, key)),
            _ => Err(StorageError::invalid_reference(format!(
                "{} is not an S3 reference",
                reference
            ))),
        }
    }

    /// Map SDK errors by their service code.
    fn map_error(reference: &str, e: impl std::fmt::Display) -> StorageError {
        let message = e.to_string();
        if message.contains("NoSuchKey") || message.contains("NotFound") || message.contains("NoSuchBucket") {
            StorageError::not_found(reference.to_string())
        } else if message.contains("AccessDenied") || message.contains("InvalidAccessKeyId") {
            StorageError::Unauthenticated(message)
        } else if message.contains("SlowDown") {
            StorageError::RateLimited {
                message,
                retry_after_ms: None,
            }
        } else {
            StorageError::request_failed(message)
        }
    }

    async fn download(&self, bucket: &str, key: &str, reference: &str, path: &Path) -> StorageResult<u64> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_error(reference, aws_sdk_s3::error::DisplayErrorContext(e)))?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::request_failed(format!("Download of {} interrupted: {}", reference, e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl SourceStore for S3Source {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        let (bucket, key) = Self::location(reference)?;
        let start = Instant::now();

        let result = self
            .client
            .head_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_error(reference, aws_sdk_s3::error::DisplayErrorContext(e)));
        record_request(BACKEND, "resolve", result.is_ok(), start.elapsed().as_millis() as f64);
        let head = result?;

        let name = key.rsplit('/').next().unwrap_or(&key).to_string();
        let mut info = ObjectInfo::new(format!("s3://{}/{}", bucket, key), name)
            .with_size(head.content_length().unwrap_or(0).max(0) as u64)
            .with_mime_type(head.content_type().unwrap_or_default());
        info.modified_time = head
            .last_modified()
            .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok());

        debug!(bucket = %bucket, key = %key, size = info.size, "Resolved S3 object");
        Ok(info)
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        let (bucket, key) = Self::location(&info.id)?;
        ensure_dir(dir).await?;
        let path = download_path(dir, &info.name, &info.mime_type);
        let start = Instant::now();

        let result = self.download(&bucket, &key, &info.id, &path).await;
        record_request(BACKEND, "fetch", result.is_ok(), start.elapsed().as_millis() as f64);

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&path).await;
                return Err(e);
            }
        };

        record_bytes_downloaded(BACKEND, bytes);
        info!(bucket = %bucket, key = %key, path = %path.display(), bytes, "Downloaded S3 object");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location() {
        assert_eq!(
            S3Source::location("s3://media/a/b.mp4").unwrap(),
            ("media".to_string(), "a/b.mp4".to_string())
        );
        assert!(S3Source::location("https://x.test/a.mp4").is_err());
    }

    #[test]
    fn test_map_error() {
        assert!(S3Source::map_error("s3://b/k", "NoSuchKey: missing").is_not_found());
        assert!(matches!(
            S3Source::map_error("s3://b/k", "AccessDenied"),
            StorageError::Unauthenticated(_)
        ));
        assert!(S3Source::map_error("s3://b/k", "SlowDown").is_retryable());
    }
}
