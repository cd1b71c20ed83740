//! Chat command handling.
//!
//! Every inbound chat message is one command. All state lives in the
//! subscriber store; the handler only decides what to change and what to
//! reply.

use crate::core::{ChatId, SubscriberStore};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const SUBSCRIBED_REPLY: &str = "Successfully subscribed";
pub const UNSUBSCRIBED_REPLY: &str = "Successfully unsubscribed";
pub const HELP_REPLY: &str = "Unknown command.\nUse /subscribe or /unsubscribe";
pub const RETRY_REPLY: &str = "Something went wrong, please try again later";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Subscribe,
    Unsubscribe,
    Unknown,
}

impl Command {
    /// Parses the text of a chat message.
    ///
    /// A command is the whole message. Group chats address commands as
    /// `/subscribe@BotName`, so a mention suffix on that single word is
    /// ignored.
    pub fn parse(text: &str) -> Self {
        let word = text.trim();
        if word.contains(char::is_whitespace) {
            return Command::Unknown;
        }
        let word = word.split_once('@').map_or(word, |(command, _)| command);
        match word {
            "/subscribe" => Command::Subscribe,
            "/unsubscribe" => Command::Unsubscribe,
            _ => Command::Unknown,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Command::Subscribe => "subscribe",
            Command::Unsubscribe => "unsubscribe",
            Command::Unknown => "unknown",
        }
    }
}

pub struct CommandHandler {
    store: Arc<dyn SubscriberStore>,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self { store }
    }

    /// Applies the command in `text` on behalf of `chat_id` and returns the
    /// reply for that chat.
    ///
    /// Store failures never propagate: the chat gets a retry hint instead.
    #[instrument(skip(self, text), fields(chat_id = %chat_id))]
    pub async fn handle(&self, chat_id: &ChatId, text: &str) -> String {
        let command = Command::parse(text);
        metrics::counter!("commands_handled_total", "command" => command.as_str()).increment(1);

        let result = match command {
            Command::Subscribe => self.store.add_if_absent(chat_id).await.map(|added| {
                info!(added, "Chat subscribed");
                SUBSCRIBED_REPLY
            }),
            Command::Unsubscribe => self.store.remove_all(chat_id).await.map(|()| {
                info!("Chat unsubscribed");
                UNSUBSCRIBED_REPLY
            }),
            Command::Unknown => Ok(HELP_REPLY),
        };

        match result {
            Ok(reply) => reply.to_string(),
            Err(e) => {
                error!(command = command.as_str(), error = %e, "Failed to apply chat command");
                RETRY_REPLY.to_string()
            }
        }
    }
}
