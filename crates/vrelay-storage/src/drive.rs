//! Google Drive v3 REST client.
//!
//! - Service-account OAuth through a cached token, or a plain API key
//! - Streamed media downloads
//! - Video search with name and folder filters
//! - Retry with backoff on transient failures

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gcp_auth::CustomServiceAccount;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{info, info_span, Instrument};

use vrelay_models::{ObjectInfo, SearchQuery};

use crate::download::{download_path, ensure_dir, stream_to_file};
use crate::error::{parse_retry_after, StorageError, StorageResult};
use crate::metrics::{record_bytes_downloaded, record_request};
use crate::reference::SourceRef;
use crate::retry::{with_retry, RetryConfig};
use crate::store::SourceStore;
use crate::token_cache::{TokenCache, DRIVE_READONLY_SCOPE};

const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";

const FILE_FIELDS: &str = "id,name,size,mimeType,createdTime,modifiedTime,webViewLink,thumbnailLink";

/// MIME types considered videos by search.
pub const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/mkv",
    "video/webm",
    "video/flv",
];

const BACKEND: &str = "drive";

/// Drive client configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// API root, overridable for tests
    pub api_base_url: String,
    /// Service account JSON file
    pub credentials_path: Option<PathBuf>,
    /// API key, used when no service account is configured
    pub api_key: Option<String>,
    /// Folder searched when the query names none
    pub folder_id: Option<String>,
    /// Timeout for metadata requests (downloads are unbounded)
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            credentials_path: None,
            api_key: None,
            folder_id: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

impl DriveConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            api_base_url: non_empty("GOOGLE_DRIVE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            credentials_path: non_empty("GOOGLE_APPLICATION_CREDENTIALS")
                .or_else(|| non_empty("GOOGLE_SERVICE_ACCOUNT_KEY"))
                .map(PathBuf::from),
            api_key: non_empty("GOOGLE_DRIVE_API_KEY"),
            folder_id: non_empty("GOOGLE_DRIVE_FOLDER_ID"),
            retry: RetryConfig::from_env(),
            ..Self::default()
        }
    }

    /// Whether any credential is present.
    pub fn is_configured(&self) -> bool {
        self.credentials_path.is_some() || self.api_key.is_some()
    }
}

enum DriveAuth {
    ServiceAccount(Arc<TokenCache>),
    ApiKey(String),
}

/// Google Drive source backend.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
    auth: Arc<DriveAuth>,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(config: DriveConfig) -> StorageResult<Self> {
        let auth = match (&config.credentials_path, &config.api_key) {
            (Some(path), _) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    StorageError::config_error(format!(
                        "Failed to load service account {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                DriveAuth::ServiceAccount(Arc::new(TokenCache::new(Arc::new(account), DRIVE_READONLY_SCOPE)))
            }
            (None, Some(key)) => DriveAuth::ApiKey(key.clone()),
            (None, None) => {
                return Err(StorageError::config_error(
                    "Google Drive credentials not configured. \
                     Set GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_DRIVE_API_KEY.",
                ))
            }
        };

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vrelay-storage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            auth: Arc::new(auth),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(DriveConfig::from_env())
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.config.api_base_url.trim_end_matches('/'))
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_url(), urlencoding::encode(file_id))
    }

    async fn authorize(&self, request: RequestBuilder) -> StorageResult<RequestBuilder> {
        match self.auth.as_ref() {
            DriveAuth::ServiceAccount(cache) => Ok(request.bearer_auth(cache.get_token().await?)),
            DriveAuth::ApiKey(key) => Ok(request.query(&[("key", key.as_str())])),
        }
    }

    /// Send an authorized request, refreshing the token once on 401.
    async fn send<F>(&self, build: F) -> StorageResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = self.authorize(build()).await?.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let DriveAuth::ServiceAccount(cache) = self.auth.as_ref() {
                cache.invalidate().await;
                let response = self.authorize(build()).await?.send().await?;
                return Self::check(response).await;
            }
        }

        Self::check(response).await
    }

    async fn check(response: Response) -> StorageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::from_http_status(status.as_u16(), body, retry_after))
    }

    async fn execute<T, F>(&self, operation: &'static str, fut: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        let span = info_span!("drive_request", operation = %operation);
        let start = Instant::now();
        let result = fut.instrument(span).await;
        record_request(BACKEND, operation, result.is_ok(), start.elapsed().as_millis() as f64);
        result
    }

    fn file_id(reference: &str) -> StorageResult<String> {
        match SourceRef::parse(reference)? {
            SourceRef::Drive { file_id } => Ok(file_id),
            _ => Err(StorageError::invalid_reference(format!(
                "{} is not a Google Drive reference",
                reference
            ))),
        }
    }
}

/// Drive `files` resource, the fields we request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    /// int64 encoded as a string
    size: Option<String>,
    mime_type: Option<String>,
    modified_time: Option<String>,
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl From<DriveFile> for ObjectInfo {
    fn from(file: DriveFile) -> Self {
        let size = file.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0);
        let download_url = format!("https://drive.google.com/uc?id={}&export=download", file.id);
        let mut info = ObjectInfo::new(file.id, file.name)
            .with_size(size)
            .with_mime_type(file.mime_type.unwrap_or_default());
        info.modified_time = file.modified_time;
        info.web_view_link = file.web_view_link;
        info.download_url = Some(download_url);
        info
    }
}

/// Build the Drive `q` expression for a video search.
pub fn build_search_query(name: Option<&str>, folder_id: Option<&str>) -> String {
    let mime_clause = VIDEO_MIME_TYPES
        .iter()
        .map(|m| format!("mimeType='{}'", m))
        .collect::<Vec<_>>()
        .join(" or ");

    let mut q = format!("({})", mime_clause);

    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        q.push_str(&format!(" and name contains '{}'", escape_literal(name)));
    }
    if let Some(folder) = folder_id.map(str::trim).filter(|f| !f.is_empty()) {
        q.push_str(&format!(" and '{}' in parents", escape_literal(folder)));
    }
    q.push_str(" and trashed=false");
    q
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl SourceStore for DriveClient {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        let file_id = Self::file_id(reference)?;
        let url = self.file_url(&file_id);

        let file: DriveFile = self
            .execute(
                "resolve",
                with_retry(&self.config.retry, "drive.resolve", || async {
                    let response = self
                        .send(|| {
                            self.http
                                .get(&url)
                                .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
                                .timeout(self.config.timeout)
                        })
                        .await?;
                    Ok(response.json::<DriveFile>().await?)
                }),
            )
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    StorageError::not_found(format!("Google Drive file {}", file_id))
                } else {
                    e
                }
            })?;

        Ok(file.into())
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        ensure_dir(dir).await?;
        let url = self.file_url(&info.id);
        let path = download_path(dir, &info.name, &info.mime_type);

        let bytes = self
            .execute(
                "fetch",
                with_retry(&self.config.retry, "drive.fetch", || async {
                    let response = self
                        .send(|| {
                            self.http
                                .get(&url)
                                .query(&[("alt", "media"), ("supportsAllDrives", "true")])
                        })
                        .await?;
                    stream_to_file(response, &path).await
                }),
            )
            .await?;

        record_bytes_downloaded(BACKEND, bytes);
        info!(file_id = %info.id, path = %path.display(), bytes, "Downloaded Drive file");
        Ok(path)
    }

    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<ObjectInfo>> {
        let folder = query.folder_id.as_deref().or(self.config.folder_id.as_deref());
        let q = build_search_query(query.query.as_deref(), folder);
        let page_size = query.effective_limit().to_string();
        let fields = format!("files({})", FILE_FIELDS);
        let url = self.files_url();

        let list: DriveFileList = self
            .execute(
                "search",
                with_retry(&self.config.retry, "drive.search", || async {
                    let response = self
                        .send(|| {
                            self.http
                                .get(&url)
                                .query(&[
                                    ("q", q.as_str()),
                                    ("fields", fields.as_str()),
                                    ("pageSize", page_size.as_str()),
                                    ("orderBy", "modifiedTime desc"),
                                    ("supportsAllDrives", "true"),
                                    ("includeItemsFromAllDrives", "true"),
                                ])
                                .timeout(self.config.timeout)
                        })
                        .await?;
                    Ok(response.json::<DriveFileList>().await?)
                }),
            )
            .await?;

        info!(count = list.files.len(), query = ?query.query, "Drive search completed");
        Ok(list.files.into_iter().map(ObjectInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_query() {
        let q = build_search_query(Some("holiday"), Some("folder-1"));
        assert!(q.starts_with("(mimeType='video/mp4' or "));
        assert!(q.contains("mimeType='video/flv'"));
        assert!(q.contains(" and name contains 'holiday'"));
        assert!(q.contains(" and 'folder-1' in parents"));

        let q = build_search_query(Some("  "), None);
        assert!(!q.contains("name contains"));
        assert!(!q.contains("in parents"));
    }

    #[test]
    fn test_search_query_escapes_quotes() {
        let q = build_search_query(Some("Bob's clip"), None);
        assert!(q.contains(r"name contains 'Bob\'s clip'"));
    }

    #[test]
    fn test_drive_file_into_object_info() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"f1","name":"a.mov","size":"2048","mimeType":"video/quicktime",
                "modifiedTime":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let info = ObjectInfo::from(file);
        assert_eq!(info.size, 2048);
        assert_eq!(info.mime_type, "video/quicktime");
        assert_eq!(
            info.download_url.as_deref(),
            Some("https://drive.google.com/uc?id=f1&export=download")
        );
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = DriveClient::new(DriveConfig::default()).err().unwrap();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_foreign_references() {
        assert!(DriveClient::file_id("s3://b/k").is_err());
        assert_eq!(DriveClient::file_id("drive:abc").unwrap(), "abc");
    }
}
