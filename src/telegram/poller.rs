//! Long-polling intake for chat commands.

use super::TelegramClient;
use crate::commands::CommandHandler;
use crate::core::{ChatId, MessageSender, ParseMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Pulls updates from `getUpdates` and answers each chat message on its own
/// task. Reply tasks still running at shutdown are awaited before `run`
/// returns.
pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    handler: Arc<CommandHandler>,
    sender: Arc<dyn MessageSender>,
    poll_timeout: Duration,
}

impl UpdatePoller {
    pub fn new(
        client: Arc<TelegramClient>,
        handler: Arc<CommandHandler>,
        sender: Arc<dyn MessageSender>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            handler,
            sender,
            poll_timeout,
        }
    }

    /// Runs the poll loop until the shutdown signal fires.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Telegram update poller started.");
        let mut offset = 0;
        let mut replies = JoinSet::new();
        loop {
            while let Some(finished) = replies.try_join_next() {
                log_reply_task(finished);
            }

            let result = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Update poller received shutdown signal.");
                    break;
                }
                result = self.client.get_updates(offset, self.poll_timeout) => result,
            };

            match result {
                Ok(updates) => {
                    trace!(count = updates.len(), "Received updates");
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(message) = update.message else {
                            continue;
                        };
                        let Some(text) = message.text else {
                            debug!(update_id = update.update_id, "Ignoring message without text");
                            continue;
                        };
                        self.spawn_reply(&mut replies, ChatId::from(message.chat.id), text);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch updates, backing off");
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        if !replies.is_empty() {
            info!(pending = replies.len(), "Waiting for in-flight command replies");
        }
        while let Some(finished) = replies.join_next().await {
            log_reply_task(finished);
        }
        info!("Telegram update poller finished.");
    }

    fn spawn_reply(&self, replies: &mut JoinSet<()>, chat_id: ChatId, text: String) {
        let handler = self.handler.clone();
        let sender = self.sender.clone();
        replies.spawn(async move {
            let reply = handler.handle(&chat_id, &text).await;
            if let Err(e) = sender.send(&chat_id, &reply, ParseMode::Plain).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to send command reply");
            }
        });
    }
}

fn log_reply_task(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Command reply task panicked");
    }
}
