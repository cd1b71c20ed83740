//! Telegram Bot API integration.
//!
//! [`client::TelegramClient`] is the production [`MessageSender`]; the
//! [`poller::UpdatePoller`] long-polls for chat commands and answers them.
//!
//! [`MessageSender`]: crate::core::MessageSender

pub mod client;
pub mod poller;

pub use client::TelegramClient;
pub use poller::UpdatePoller;

use crate::core::ChatId;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("sending to chat {chat_id} timed out after {timeout:?}")]
    Timeout { chat_id: ChatId, timeout: Duration },

    #[error("HTTP request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}

/// An incoming update from `getUpdates`. Only message updates are requested.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}
