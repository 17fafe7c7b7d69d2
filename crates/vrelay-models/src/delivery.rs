//! Delivery receipts and upload options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::request::Control;

/// How the media reached the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Inline playable video
    Streaming,
    /// Generic file attachment, used above the payload limit
    Document,
}

/// Proof of delivery returned by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub chat_id: String,
    pub mode: DeliveryMode,
}

/// Options attached to an upload.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOptions {
    pub caption: Option<String>,
    pub controls: Vec<Control>,
    pub thumbnail: Option<PathBuf>,
    /// Playback hints
    pub duration: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
