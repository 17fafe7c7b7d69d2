//! Source reference parsing.
//!
//! A source reference is whatever the caller put in `sourceRef`:
//!
//! | Form | Kind |
//! |---|---|
//! | `https://drive.google.com/file/d/<id>/view` | Drive |
//! | `https://drive.google.com/open?id=<id>`, `...?id=<id>` | Drive |
//! | `drive:<id>` or a bare Drive id | Drive |
//! | `s3://bucket/key` | S3 |
//! | any other `http(s)://` URL | Http |

use std::fmt;

use url::Url;

use crate::error::{StorageError, StorageResult};

/// Parsed source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Drive { file_id: String },
    S3 { bucket: String, key: String },
    Http { url: String },
}

/// Backend family a reference dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Drive,
    S3,
    Http,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Drive => "drive",
            SourceKind::S3 => "s3",
            SourceKind::Http => "http",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SourceRef {
    pub fn parse(reference: &str) -> StorageResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StorageError::invalid_reference("empty reference"));
        }

        if let Some(id) = reference.strip_prefix("drive:") {
            return drive_id(id.trim())
                .map(|file_id| SourceRef::Drive { file_id })
                .ok_or_else(|| StorageError::invalid_reference(reference));
        }

        if reference.contains("://") {
            let url = Url::parse(reference)
                .map_err(|e| StorageError::invalid_reference(format!("{}: {}", reference, e)))?;
            return Self::from_url(reference, &url);
        }

        drive_id(reference)
            .map(|file_id| SourceRef::Drive { file_id })
            .ok_or_else(|| StorageError::invalid_reference(reference))
    }

    fn from_url(reference: &str, url: &Url) -> StorageResult<Self> {
        match url.scheme() {
            "s3" => {
                let bucket = url.host_str().unwrap_or_default().to_string();
                let raw_key = url.path().trim_start_matches('/');
                let key = urlencoding::decode(raw_key)
                    .map(|k| k.into_owned())
                    .unwrap_or_else(|_| raw_key.to_string());
                if bucket.is_empty() || key.is_empty() {
                    return Err(StorageError::invalid_reference(format!(
                        "{}: expected s3://bucket/key",
                        reference
                    )));
                }
                Ok(SourceRef::S3 { bucket, key })
            }
            "http" | "https" => {
                let is_google = url
                    .host_str()
                    .map(|h| h == "google.com" || h.ends_with(".google.com"))
                    .unwrap_or(false);
                if is_google {
                    if let Some(file_id) = drive_id_from_url(url) {
                        return Ok(SourceRef::Drive { file_id });
                    }
                }
                Ok(SourceRef::Http {
                    url: reference.to_string(),
                })
            }
            other => Err(StorageError::invalid_reference(format!(
                "{}: unsupported scheme '{}'",
                reference, other
            ))),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRef::Drive { .. } => SourceKind::Drive,
            SourceRef::S3 { .. } => SourceKind::S3,
            SourceRef::Http { .. } => SourceKind::Http,
        }
    }

    /// Canonical string form, parses back to the same reference.
    pub fn canonical(&self) -> String {
        match self {
            SourceRef::Drive { file_id } => file_id.clone(),
            SourceRef::S3 { bucket, key } => format!("s3://{}/{}", bucket, key),
            SourceRef::Http { url } => url.clone(),
        }
    }
}

/// `/file/d/<id>` in the path, else an `id` query parameter.
fn drive_id_from_url(url: &Url) -> Option<String> {
    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.collect();
        if let Some(pos) = segments.windows(2).position(|w| w == ["file", "d"]) {
            if let Some(id) = segments.get(pos + 2).and_then(|s| drive_id(s)) {
                return Some(id);
            }
        }
    }

    url.query_pairs()
        .find(|(k, _)| k == "id")
        .and_then(|(_, v)| drive_id(&v))
}

fn drive_id(candidate: &str) -> Option<String> {
    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| candidate.to_string())
}
