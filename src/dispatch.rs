//! Fan-out of rendered alert messages to subscribers.
//!
//! A dispatch never stops early: every (message, subscriber) pair is
//! attempted once, and each attempt produces a [`SendOutcome`]. Failed sends
//! are logged and counted, and the caller receives a [`DispatchReport`]
//! summarising the whole fan-out.

use crate::core::{ChatId, MessageSender, ParseMode, RenderedMessage, SubscriberStore};
use crate::store::StoreError;
use crate::telegram::SendError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// The order in which (message, subscriber) pairs are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutOrder {
    /// Every subscriber receives message 1 before anyone receives message 2.
    #[default]
    MessageMajor,
    /// Each subscriber receives the whole batch before the next subscriber.
    SubscriberMajor,
}

/// The result of one send attempt.
#[derive(Debug)]
pub struct SendOutcome {
    /// Index of the message within the dispatched batch.
    pub message_index: usize,
    pub chat_id: ChatId,
    pub result: Result<(), SendError>,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<SendOutcome>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.delivered()
    }

    /// The outcomes that did not deliver.
    pub fn failures(&self) -> impl Iterator<Item = &SendOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

pub struct Dispatcher {
    sender: Arc<dyn MessageSender>,
    order: FanOutOrder,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, order: FanOutOrder, send_timeout: Duration) -> Self {
        Self {
            sender,
            order,
            send_timeout,
        }
    }

    /// Reads a snapshot of the current subscribers and dispatches to them.
    ///
    /// Failing to read the subscriber list is fatal, since there is no one to
    /// deliver to. Subscription changes made while the dispatch runs are not
    /// reflected in it.
    pub async fn deliver(
        &self,
        store: &dyn SubscriberStore,
        messages: &[RenderedMessage],
    ) -> Result<DispatchReport, StoreError> {
        let subscribers = store.list_all().await?;
        Ok(self.dispatch(messages, &subscribers).await)
    }

    /// Sends every message to every subscriber.
    #[instrument(skip_all, fields(messages = messages.len(), subscribers = subscribers.len()))]
    pub async fn dispatch(
        &self,
        messages: &[RenderedMessage],
        subscribers: &[ChatId],
    ) -> DispatchReport {
        let start = Instant::now();
        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(messages.len() * subscribers.len()),
        };

        match self.order {
            FanOutOrder::MessageMajor => {
                for (index, message) in messages.iter().enumerate() {
                    for chat_id in subscribers {
                        report.outcomes.push(self.send_one(index, message, chat_id).await);
                    }
                }
            }
            FanOutOrder::SubscriberMajor => {
                for chat_id in subscribers {
                    for (index, message) in messages.iter().enumerate() {
                        report.outcomes.push(self.send_one(index, message, chat_id).await);
                    }
                }
            }
        }

        metrics::histogram!("dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
        if report.failed() > 0 {
            warn!(
                attempted = report.attempted(),
                failed = report.failed(),
                "Dispatch finished with failed sends"
            );
        } else {
            info!(delivered = report.delivered(), "Dispatch finished");
        }
        report
    }

    async fn send_one(&self, message_index: usize, message: &RenderedMessage, chat_id: &ChatId) -> SendOutcome {
        let send = self.sender.send(chat_id, &message.text, ParseMode::Html);
        let result = match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout {
                chat_id: chat_id.clone(),
                timeout: self.send_timeout,
            }),
        };

        match &result {
            Ok(()) => {
                debug!(chat_id = %chat_id, message_index, "Message sent");
                metrics::counter!("messages_sent_total", "outcome" => "delivered").increment(1);
            }
            Err(e) => {
                warn!(chat_id = %chat_id, message_index, error = %e, "Failed to send message, continuing");
                metrics::counter!("messages_sent_total", "outcome" => "failed").increment(1);
            }
        }

        SendOutcome {
            message_index,
            chat_id: chat_id.clone(),
            result,
        }
    }
}
