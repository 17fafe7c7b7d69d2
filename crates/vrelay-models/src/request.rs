//! Job submission requests.
//!
//! Webhook callers (workflow tools, bots) name their fields in several
//! ways. [`normalize_webhook`] maps the recognized aliases onto one
//! [`ProcessRequest`]; nothing past the HTTP boundary sees the aliases.
//!
//! | Canonical     | Accepted aliases, first present wins              |
//! |---------------|---------------------------------------------------|
//! | `sourceRef`   | `sourceRef`, `videoUrl`, `video_url`, `url`       |
//! | `destination` | `destination`, `chatId`, `chat_id`, `telegram_chat_id` |
//! | `caption`     | `caption`, `message`                              |
//! | `controls`    | `controls`, `buttons`, `inline_buttons`           |
//!
//! Inside a control, the label comes from `label` or `text` and the
//! action from `action`, `url` or `callback_data`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::object::{ObjectInfo, SearchQuery};

pub const SOURCE_REF_ALIASES: &[&str] = &["sourceRef", "videoUrl", "video_url", "url"];
pub const DESTINATION_ALIASES: &[&str] = &["destination", "chatId", "chat_id", "telegram_chat_id"];
pub const CAPTION_ALIASES: &[&str] = &["caption", "message"];
pub const CONTROLS_ALIASES: &[&str] = &["controls", "buttons", "inline_buttons"];

const CONTROL_LABEL_ALIASES: &[&str] = &["label", "text"];
const CONTROL_ACTION_ALIASES: &[&str] = &["action", "url", "callback_data"];

/// Envelope keys some webhook senders wrap the payload in.
const ENVELOPE_KEYS: &[&str] = &["body", "data"];

/// An interactive button attached to the delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    /// A URL opens a link; anything else is sent back as callback data.
    pub action: String,
}

impl Control {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }

    /// Whether the action is a link rather than callback data.
    pub fn is_link(&self) -> bool {
        let action = self.action.trim_start().to_ascii_lowercase();
        action.starts_with("https://") || action.starts_with("http://") || action.starts_with("tg://")
    }
}

/// Canonical job submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub source_ref: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default)]
    pub controls: Vec<Control>,
}

impl ProcessRequest {
    pub fn new(source_ref: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            destination: destination.into(),
            caption: None,
            controls: Vec::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        match (self.source_ref.trim().is_empty(), self.destination.trim().is_empty()) {
            (true, true) => Err("sourceRef and destination are required".to_string()),
            (true, false) => Err("sourceRef is required".to_string()),
            (false, true) => Err("destination is required".to_string()),
            (false, false) => Ok(()),
        }
    }
}

/// Submit every video found in a folder to one chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoProcessRequest {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default, alias = "chat_id", alias = "destination", deserialize_with = "string_or_number")]
    pub chat_id: String,
    /// Optional name filter
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl AutoProcessRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.chat_id.trim().is_empty() {
            return Err("chatId is required".to_string());
        }
        Ok(())
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            query: self.query.clone(),
            folder_id: self.folder_id.clone().filter(|f| !f.trim().is_empty()),
            limit: self.limit,
        }
    }

    /// Per-video request with the like/share callback controls.
    ///
    /// Search only covers Drive, so the id is pinned to that backend.
    pub fn request_for(&self, video: &ObjectInfo, caption: impl Into<String>) -> ProcessRequest {
        ProcessRequest::new(format!("drive:{}", video.id), self.chat_id.trim())
            .with_caption(caption)
            .with_control(Control::new("👍 Like", format!("like_{}", video.id)))
            .with_control(Control::new("📤 Share", format!("share_{}", video.id)))
    }
}

/// Map a webhook payload onto a [`ProcessRequest`].
///
/// Missing fields come back empty; call [`ProcessRequest::validate`] on
/// the result.
pub fn normalize_webhook(payload: &Value) -> ProcessRequest {
    let Some(fields) = unwrap_envelope(payload) else {
        return ProcessRequest::default();
    };

    ProcessRequest {
        source_ref: pick_string(fields, SOURCE_REF_ALIASES).unwrap_or_default(),
        destination: pick_string(fields, DESTINATION_ALIASES).unwrap_or_default(),
        caption: pick_string(fields, CAPTION_ALIASES),
        controls: pick_controls(fields),
    }
}

fn unwrap_envelope(payload: &Value) -> Option<&Map<String, Value>> {
    let top = payload.as_object()?;
    if SOURCE_REF_ALIASES.iter().any(|k| top.contains_key(*k)) {
        return Some(top);
    }
    ENVELOPE_KEYS
        .iter()
        .find_map(|k| top.get(*k).and_then(Value::as_object))
        .or(Some(top))
}

/// First alias holding a non-empty string or a number.
fn pick_string(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| match fields.get(*alias)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn pick_controls(fields: &Map<String, Value>) -> Vec<Control> {
    let Some(items) = CONTROLS_ALIASES
        .iter()
        .find_map(|alias| fields.get(*alias).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    let mut controls = Vec::new();
    for item in items {
        match item {
            // Telegram-style keyboard rows: [[{text, url}], ...]
            Value::Array(row) => controls.extend(row.iter().filter_map(control_from_value)),
            other => controls.extend(control_from_value(other)),
        }
    }
    controls
}

fn control_from_value(value: &Value) -> Option<Control> {
    let fields = value.as_object()?;
    let label = pick_string(fields, CONTROL_LABEL_ALIASES)?;
    let action = pick_string(fields, CONTROL_ACTION_ALIASES)?;
    Some(Control { label, action })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Ok(String::new()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_requires_both_fields() {
        assert!(ProcessRequest::new("ref", "chat").validate().is_ok());
        assert_eq!(
            ProcessRequest::new("  ", "chat").validate().unwrap_err(),
            "sourceRef is required"
        );
        assert_eq!(
            ProcessRequest::new("ref", "").validate().unwrap_err(),
            "destination is required"
        );
        assert!(ProcessRequest::default().validate().is_err());
    }

    #[test]
    fn test_canonical_body_deserializes_numeric_destination() {
        let req: ProcessRequest = serde_json::from_value(json!({
            "sourceRef": "drive:abc",
            "destination": -100123,
            "controls": [{"label": "Open", "action": "https://example.com"}]
        }))
        .unwrap();
        assert_eq!(req.destination, "-100123");
        assert_eq!(req.controls.len(), 1);
        assert!(req.controls[0].is_link());
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let req: ProcessRequest = serde_json::from_value(json!({"caption": "x"})).unwrap();
        assert!(req.source_ref.is_empty());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_auto_process_request_builds_callback_controls() {
        let req: AutoProcessRequest =
            serde_json::from_value(json!({"folderId": "f1", "chatId": 42})).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.search_query().folder_id.as_deref(), Some("f1"));

        let job = req.request_for(&ObjectInfo::new("a1", "beach.mp4"), "cap");
        assert_eq!(job.source_ref, "drive:a1");
        assert_eq!(job.destination, "42");
        assert_eq!(job.caption.as_deref(), Some("cap"));
        assert_eq!(job.controls[0].action, "like_a1");
        assert_eq!(job.controls[1].action, "share_a1");
        assert!(job.controls.iter().all(|c| !c.is_link()));
    }

    #[test]
    fn test_auto_process_request_requires_chat() {
        let req: AutoProcessRequest = serde_json::from_value(json!({"folderId": "f1"})).unwrap();
        assert_eq!(req.validate().unwrap_err(), "chatId is required");
        let req: AutoProcessRequest = serde_json::from_value(json!({"chat_id": "7"})).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.search_query().folder_id.is_none());
    }

    #[test]
    fn test_normalize_snake_case_aliases() {
        let req = normalize_webhook(&json!({
            "video_url": "https://drive.google.com/file/d/abc/view",
            "chat_id": 42,
            "message": "Hello",
            "inline_buttons": [{"text": "Like", "callback_data": "like"}]
        }));
        assert_eq!(req.source_ref, "https://drive.google.com/file/d/abc/view");
        assert_eq!(req.destination, "42");
        assert_eq!(req.caption.as_deref(), Some("Hello"));
        assert_eq!(req.controls, vec![Control::new("Like", "like")]);
        assert!(!req.controls[0].is_link());
    }

    #[test]
    fn test_normalize_alias_precedence() {
        let req = normalize_webhook(&json!({
            "url": "second",
            "videoUrl": "first",
            "telegram_chat_id": "c2",
            "chatId": "c1"
        }));
        assert_eq!(req.source_ref, "first");
        assert_eq!(req.destination, "c1");
    }

    #[test]
    fn test_normalize_skips_blank_alias() {
        let req = normalize_webhook(&json!({"videoUrl": "", "url": "fallback", "chatId": "1"}));
        assert_eq!(req.source_ref, "fallback");
    }

    #[test]
    fn test_normalize_unwraps_envelope() {
        let req = normalize_webhook(&json!({
            "body": {"videoUrl": "drive:xyz", "chatId": "7"}
        }));
        assert_eq!(req.source_ref, "drive:xyz");
        assert_eq!(req.destination, "7");
    }

    #[test]
    fn test_normalize_keyboard_rows() {
        let req = normalize_webhook(&json!({
            "url": "drive:1",
            "chatId": "1",
            "buttons": [
                [{"text": "Site", "url": "https://a.example"}],
                [{"text": "Vote", "callback_data": "v"}, {"text": "no action"}]
            ]
        }));
        assert_eq!(
            req.controls,
            vec![Control::new("Site", "https://a.example"), Control::new("Vote", "v")]
        );
    }

    #[test]
    fn test_normalize_non_object() {
        let req = normalize_webhook(&json!(["not", "an", "object"]));
        assert_eq!(req, ProcessRequest::default());
    }
}
