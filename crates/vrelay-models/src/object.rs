//! Remote storage objects.

use serde::{Deserialize, Serialize};

/// Metadata of a resolved remote media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub id: String,
    pub name: String,
    /// Size in bytes, 0 when the backend does not report it
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ObjectInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: 0,
            mime_type: String::new(),
            modified_time: None,
            web_view_link: None,
            download_url: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Search over a storage collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Name substring
    #[serde(default)]
    pub query: Option<String>,
    /// Restrict to one folder
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_SEARCH_LIMIT).min(100)
    }
}
