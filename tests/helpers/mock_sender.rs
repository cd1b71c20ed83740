//! A mock message sender that records every send.

use alertgram::telegram::SendError;
use alertgram::{ChatId, MessageSender, ParseMode};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub mode: ParseMode,
}

/// Records successful sends in order. Sends to chats registered with
/// [`RecordingSender::failing_for`] return an API error instead.
#[derive(Clone, Debug, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<Vec<ChatId>>>,
    failing: Arc<Mutex<HashSet<ChatId>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(self, chat_id: &str) -> Self {
        self.failing.lock().unwrap().insert(ChatId::from(chat_id));
        self
    }

    /// Messages that were delivered, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Every chat a send was attempted to, including failures.
    pub fn attempts(&self) -> Vec<ChatId> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: &ChatId, text: &str, mode: ParseMode) -> Result<(), SendError> {
        self.attempts.lock().unwrap().push(chat_id.clone());
        if self.failing.lock().unwrap().contains(chat_id) {
            return Err(SendError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id: chat_id.clone(),
            text: text.to_string(),
            mode,
        });
        Ok(())
    }
}
