//! A process-local subscriber store.
//!
//! Nothing survives a restart; this backend exists for tests and for running
//! the bridge without Redis.

use super::StoreError;
use crate::core::{ChatId, SubscriberStore};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    subscribers: Mutex<Vec<ChatId>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given ids, in order.
    pub fn with_subscribers<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ChatId>,
    {
        Self {
            subscribers: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl SubscriberStore for InMemoryStore {
    async fn append(&self, id: &ChatId) -> Result<(), StoreError> {
        self.subscribers.lock().await.push(id.clone());
        Ok(())
    }

    async fn remove_all(&self, id: &ChatId) -> Result<(), StoreError> {
        self.subscribers.lock().await.retain(|s| s != id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ChatId>, StoreError> {
        Ok(self.subscribers.lock().await.clone())
    }

    // The check and the push happen under one lock acquisition.
    async fn add_if_absent(&self, id: &ChatId) -> Result<bool, StoreError> {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.contains(id) {
            return Ok(false);
        }
        subscribers.push(id.clone());
        Ok(true)
    }
}
