//! Core domain types and service traits for alertgram
//!
//! This module defines the alert payload accepted by the webhook, the chat
//! identifier used for subscriptions, and the trait contracts the rest of
//! the application depends on.

use crate::store::StoreError;
use crate::telegram::SendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a chat that can receive messages.
///
/// Telegram chat ids are integers, but subscribers are stored and compared in
/// their decimal string form so that any backing store can hold them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChatId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single alert as posted by the monitoring pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Alert {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Annotations,
    /// Link back to the expression that fired the alert.
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Labels {
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Annotations {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

/// One webhook payload: an overall status and the alerts it carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AlertBatch {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl AlertBatch {
    /// Decodes a batch from a raw JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(DecodeError)
    }
}

/// The inbound payload was not a valid alert batch.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode alert batch: {0}")]
pub struct DecodeError(#[source] pub serde_json::Error);

/// The text of one alert, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    /// The raw severity label of the alert this message was rendered from.
    pub severity: String,
    pub text: String,
}

/// How the receiving chat should interpret message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Plain,
    Html,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Persists the ordered list of subscribed chats.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Appends `id` to the end of the list, even if it is already present.
    async fn append(&self, id: &ChatId) -> Result<(), StoreError>;

    /// Removes every occurrence of `id`. Removing a non-member is a no-op.
    async fn remove_all(&self, id: &ChatId) -> Result<(), StoreError>;

    /// Returns the current list of subscribers, in insertion order.
    async fn list_all(&self) -> Result<Vec<ChatId>, StoreError>;

    /// Appends `id` unless it is already present.
    ///
    /// Returns `true` if the id was added. The default implementation is a
    /// read followed by a conditional append and is not atomic; stores that
    /// can do better should override it.
    async fn add_if_absent(&self, id: &ChatId) -> Result<bool, StoreError> {
        let subscribers = self.list_all().await?;
        if subscribers.contains(id) {
            return Ok(false);
        }
        self.append(id).await?;
        Ok(true)
    }
}

/// Delivers text to a single chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `text` to `chat_id`.
    ///
    /// # Returns
    /// * `Ok(())` once the platform accepted the message
    /// * `Err` if the chat is unreachable or the request failed
    async fn send(&self, chat_id: &ChatId, text: &str, mode: ParseMode) -> Result<(), SendError>;
}
