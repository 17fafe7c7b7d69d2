//! Streaming downloads into a working directory.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use vrelay_models::safe_filename;

use crate::error::{StorageError, StorageResult};

/// Collision-resistant local path for an object: `<dir>/<safe_base>_<uuid><ext>`.
pub fn download_path(dir: &Path, name: &str, mime_type: &str) -> PathBuf {
    let ext = extension_for(name, mime_type);
    dir.join(format!("{}_{}{}", safe_filename(name), Uuid::new_v4().simple(), ext))
}

/// Extension from the object name, else from the MIME type, with a leading dot.
fn extension_for(name: &str, mime_type: &str) -> String {
    let from_name = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    let ext = from_name.or_else(|| {
        let mapped = match mime_type {
            "video/mp4" => "mp4",
            "video/quicktime" | "video/mov" => "mov",
            "video/x-matroska" | "video/mkv" => "mkv",
            "video/webm" => "webm",
            "video/x-msvideo" | "video/avi" => "avi",
            "video/x-flv" | "video/flv" => "flv",
            _ => return None,
        };
        Some(mapped.to_string())
    });

    ext.map(|e| format!(".{}", e)).unwrap_or_default()
}

/// Stream a response body to `path`, returning the bytes written.
///
/// A partial file is removed when the transfer fails.
pub async fn stream_to_file(response: reqwest::Response, path: &Path) -> StorageResult<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let result = write_stream(response, path).await;
    if result.is_err() {
        remove_partial(path).await;
    }
    result
}

async fn write_stream(response: reqwest::Response, path: &Path) -> StorageResult<u64> {
    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let data = chunk?;
        file.write_all(&data).await?;
        written += data.len() as u64;
    }
    file.flush().await?;

    debug!(path = %path.display(), bytes = written, "Download completed");
    Ok(written)
}

pub(crate) async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove partial download: {}", e);
        }
    }
}

/// Fail early with a readable error when the target directory is unusable.
pub(crate) async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    fs::create_dir_all(dir).await.map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot create {}: {}", dir.display(), e),
        ))
    })
}
