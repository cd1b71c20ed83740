//! A subscriber store whose backend is always unavailable.

use alertgram::store::StoreError;
use alertgram::{ChatId, SubscriberStore};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Backend("connection refused".to_string())
}

#[async_trait]
impl SubscriberStore for FailingStore {
    async fn append(&self, _id: &ChatId) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn remove_all(&self, _id: &ChatId) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn list_all(&self) -> Result<Vec<ChatId>, StoreError> {
        Err(unavailable())
    }
}
