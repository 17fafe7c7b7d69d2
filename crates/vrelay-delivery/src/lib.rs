//! Delivery collaborator.
//!
//! This crate provides:
//! - The [`Deliverer`] trait consumed by the job orchestrator
//! - A Telegram Bot API client with streaming video upload
//! - Document fallback with a follow-up hint for oversized media
//! - Failure notifications and a `getMe` health check

pub mod client;
pub mod config;
pub mod deliverer;
pub mod error;
pub mod format;
pub mod metrics;

pub use client::{BotUser, Message, TelegramClient};
pub use config::{TelegramConfig, DEFAULT_MAX_FILE_SIZE};
pub use deliverer::Deliverer;
pub use error::{DeliveryError, DeliveryResult};
pub use format::escape_html;
