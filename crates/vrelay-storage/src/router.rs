//! Dispatch source references to the configured backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use vrelay_models::{ObjectInfo, SearchQuery};

use crate::drive::{DriveClient, DriveConfig};
use crate::error::{StorageError, StorageResult};
use crate::http::HttpSource;
use crate::reference::{SourceKind, SourceRef};
use crate::retry::RetryConfig;
use crate::s3::{S3Config, S3Source};
use crate::store::SourceStore;

/// [`SourceStore`] that picks a backend per reference.
///
/// Object ids returned by `resolve` are canonical references, so `fetch`
/// routes on them the same way.
#[derive(Clone)]
pub struct SourceRouter {
    drive: Option<Arc<dyn SourceStore>>,
    s3: Option<Arc<dyn SourceStore>>,
    http: Option<Arc<dyn SourceStore>>,
}

impl SourceRouter {
    /// A router with no backends.
    pub fn new() -> Self {
        Self {
            drive: None,
            s3: None,
            http: None,
        }
    }

    pub fn with_drive(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.drive = Some(store);
        self
    }

    pub fn with_s3(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.s3 = Some(store);
        self
    }

    pub fn with_http(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.http = Some(store);
        self
    }

    /// Build every backend whose configuration is present.
    pub fn from_env() -> StorageResult<Self> {
        let mut router = Self::new().with_http(Arc::new(HttpSource::new(RetryConfig::from_env())?));

        let drive_config = DriveConfig::from_env();
        if drive_config.is_configured() {
            router = router.with_drive(Arc::new(DriveClient::new(drive_config)?));
            info!("Google Drive source enabled");
        } else {
            warn!("No Google Drive credentials provided, Drive references will be rejected");
        }

        match S3Config::from_env() {
            Ok(config) => {
                router = router.with_s3(Arc::new(S3Source::new(config)));
                info!("S3 source enabled");
            }
            Err(e) => info!("S3 source disabled: {}", e),
        }

        Ok(router)
    }

    pub fn has_drive(&self) -> bool {
        self.drive.is_some()
    }

    fn backend(&self, kind: SourceKind) -> StorageResult<&Arc<dyn SourceStore>> {
        let backend = match kind {
            SourceKind::Drive => self.drive.as_ref(),
            SourceKind::S3 => self.s3.as_ref(),
            SourceKind::Http => self.http.as_ref(),
        };

        backend.ok_or_else(|| match kind {
            SourceKind::Drive => StorageError::Unauthenticated("Google Drive credentials are not configured".to_string()),
            other => StorageError::config_error(format!("{} storage is not configured", other)),
        })
    }
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceStore for SourceRouter {
    async fn resolve(&self, reference: &str) -> StorageResult<ObjectInfo> {
        let parsed = SourceRef::parse(reference)?;
        self.backend(parsed.kind())?.resolve(&parsed.canonical()).await
    }

    async fn fetch(&self, info: &ObjectInfo, dir: &Path) -> StorageResult<PathBuf> {
        let kind = SourceRef::parse(&info.id)?.kind();
        self.backend(kind)?.fetch(info, dir).await
    }

    async fn search(&self, query: &SearchQuery) -> StorageResult<Vec<ObjectInfo>> {
        self.backend(SourceKind::Drive)?.search(query).await
    }
}
