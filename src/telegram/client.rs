//! A client for the Telegram Bot API.

use super::{SendError, Update};
use crate::config::TelegramConfig;
use crate::core::{ChatId, MessageSender, ParseMode};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// The envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

/// A client for sending messages and receiving updates through the Bot API.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Creates a new `TelegramClient`.
    ///
    /// Requests time out after `config.request_timeout_ms`; long-poll requests
    /// extend that by the poll timeout.
    pub fn new(config: &TelegramConfig) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, SendError> {
        let mut request = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Error responses from the Bot API still carry a JSON envelope; anything
        // else (a proxy error page, say) is reported with the raw body.
        let envelope: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|_| SendError::Api {
                code: i64::from(status.as_u16()),
                description: body.clone(),
            })?;

        if envelope.ok {
            envelope.result.ok_or_else(|| SendError::Api {
                code: i64::from(status.as_u16()),
                description: format!("{method} returned no result"),
            })
        } else {
            Err(SendError::Api {
                code: envelope
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            })
        }
    }

    /// Long-polls for message updates starting at `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, SendError> {
        let payload = json!({
            "offset": offset,
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        // The server holds the request open for up to `poll_timeout`.
        let request_timeout = poll_timeout + Duration::from_secs(10);
        self.call("getUpdates", &payload, Some(request_timeout)).await
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    #[instrument(skip(self, text), fields(chat_id = %chat_id, len = text.len()))]
    async fn send(&self, chat_id: &ChatId, text: &str, mode: ParseMode) -> Result<(), SendError> {
        let mut payload = json!({
            "chat_id": chat_id.as_str(),
            "text": text,
        });
        if mode == ParseMode::Html {
            payload["parse_mode"] = json!("HTML");
        }

        let _message: Value = self.call("sendMessage", &payload, None).await?;
        debug!("Message delivered");
        Ok(())
    }
}
