//! Direct HTTP(S) source.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, info_span, Instrument};
use url::Url;

use vrelay_models::ObjectInfo;

use crate::download::{download_path, ensure_dir, stream_to_file};
use crate::error::{parse_retry_after, StorageError, StorageResult};
use crate::metrics::{record_bytes_downloaded, record_request};
use crate::reference::SourceRef;
use crate::retry::{with_retry, RetryConfig};
use crate::store::SourceStore;

const BACKEND: &str = "http";

/// Source backend for plain download URLs.
#[derive(Clone)]
pub struct HttpSource {
    http: Client,
    retry: RetryConfig,
    head_timeout: Duration,
}

impl HttpSource {
    pub fn new(retry: RetryConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vrelay-storage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            retry,
            head_timeout: Duration::from_secs(15),
        })
    }

    fn url(reference: &str) -> StorageResult<String> {
        match SourceRef::parse(reference)? {
            SourceRef::Http { url } => Ok(url),
            _ => Err(StorageError::invalid_reference(format!(
                "{} is not an HTTP reference",
                reference
            ))),
        }
    }

    async fn check(url: &str, response: Response) -> StorageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(url.to_string()));
        }
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::from_http_status(status.as_u16(), body, retry_after))
    }
}

/// Object name from `Content-Disposition`, else the last path segment.
fn object_name(url: &str, content_disposition: Option<&str>) -> String {
    if let Some(name) = content_disposition.and_then(disposition_filename) {
        return name;
    }

    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(&s).map(|d| d.into_owned()).unwrap_or(s))
        .unwrap_or_else(|| "video".to_string())
}

fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|v| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl SourceStore for HttpSource {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        let url = Self::url(reference)?;
        let start = Instant::now();

        let head = with_retry(&self.retry, "http.resolve", || async {
            let response = self.http.head(&url).timeout(self.head_timeout).send().await?;
            match response.status() {
                // Servers without HEAD support still serve the GET
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => Ok(None),
                _ => Self::check(&url, response).await.map(Some),
            }
        })
        .instrument(info_span!("http_request", operation = "resolve"))
        .await;
        record_request(BACKEND, "resolve", head.is_ok(), start.elapsed().as_millis() as f64);

        let mut info = ObjectInfo::new(url.clone(), object_name(&url, None));
        if let Some(response) = head? {
            let headers = response.headers();
            let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

            info.name = object_name(&url, header(CONTENT_DISPOSITION));
            info.size = header(CONTENT_LENGTH).and_then(|v| v.parse().ok()).unwrap_or(0);
            info.mime_type = header(CONTENT_TYPE)
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
                .unwrap_or_default();
            info.modified_time = header(LAST_MODIFIED).map(str::to_string);
        } else {
            debug!(url = %url, "HEAD not supported, resolved from URL only");
        }
        info.download_url = Some(url);

        Ok(info)
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        ensure_dir(dir).await?;
        let url = info.download_url.clone().unwrap_or_else(|| info.id.clone());
        let path = download_path(dir, &info.name, &info.mime_type);
        let start = Instant::now();

        let result = with_retry(&self.retry, "http.fetch", || async {
            let response = self.http.get(&url).send().await?;
            let response = Self::check(&url, response).await?;
            stream_to_file(response, &path).await
        })
        .instrument(info_span!("http_request", operation = "fetch"))
        .await;
        record_request(BACKEND, "fetch", result.is_ok(), start.elapsed().as_millis() as f64);

        let bytes = result?;
        record_bytes_downloaded(BACKEND, bytes);
        info!(url = %url, path = %path.display(), bytes, "Downloaded HTTP source");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("https://x.test/media/My%20Clip.mov", None), "My Clip.mov");
        assert_eq!(
            object_name("https://x.test/dl?id=1", Some("attachment; filename=\"trip.mp4\"")),
            "trip.mp4"
        );
        assert_eq!(object_name("https://x.test/", None), "video");
    }

    #[test]
    fn test_rejects_non_http_reference() {
        assert!(HttpSource::url("s3://bucket/key").is_err());
        assert!(HttpSource::url("https://x.test/a.mp4").is_ok());
    }
}
