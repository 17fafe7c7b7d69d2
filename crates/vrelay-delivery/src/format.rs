//! Message text and keyboard formatting.

use serde_json::{json, Value};
use vrelay_models::{format_file_size, Control};

/// Bot API caption length limit, in characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Bot API `callback_data` limit, in bytes.
const MAX_CALLBACK_BYTES: usize = 64;

pub const STREAMING_HINT: &str = "💡 To play this video with inline streaming, download it and the video player \
     will support streaming due to the optimized format (faststart enabled).";

/// Escape text for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cut a caption to the platform limit on a character boundary.
pub fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_CHARS {
        return caption.to_string();
    }
    let mut cut: String = caption.chars().take(MAX_CAPTION_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Caption used when the video goes out as a document.
pub fn fallback_caption(caption: Option<&str>, limit_bytes: u64) -> String {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("Video");
    format!(
        "📹 {}\n\n⚠️ This video is over {}. Download to play with full streaming support.",
        caption,
        format_file_size(limit_bytes)
    )
}

pub fn failure_text(message: &str) -> String {
    format!("❌ Error: {}", escape_html(message))
}

/// Inline keyboard with one button per row.
pub fn inline_keyboard(controls: &[Control]) -> Option<Value> {
    if controls.is_empty() {
        return None;
    }

    let rows: Vec<Value> = controls
        .iter()
        .map(|control| {
            let button = if control.is_link() {
                json!({ "text": control.label, "url": control.action.trim() })
            } else {
                json!({ "text": control.label, "callback_data": truncate_bytes(&control.action, MAX_CALLBACK_BYTES) })
            };
            json!([button])
        })
        .collect();

    Some(json!({ "inline_keyboard": rows }))
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
