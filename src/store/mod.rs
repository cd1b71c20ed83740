//! Subscriber persistence.
//!
//! The subscriber list is the only persistent state in the application.
//! Backends implement [`SubscriberStore`]; [`TimedStore`] wraps any of them so
//! that a slow backend cannot hang a request.

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use crate::core::{ChatId, SubscriberStore};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscriber store operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("subscriber store backend error: {0}")]
    Backend(String),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Applies a fixed timeout to every operation of the wrapped store.
pub struct TimedStore {
    inner: Arc<dyn SubscriberStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn SubscriberStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        };
        if let Err(e) = &result {
            warn!(operation, error = %e, "Subscriber store operation failed");
            metrics::counter!("store_errors_total", "operation" => operation).increment(1);
        }
        result
    }
}

#[async_trait]
impl SubscriberStore for TimedStore {
    async fn append(&self, id: &ChatId) -> Result<(), StoreError> {
        self.bounded("append", self.inner.append(id)).await
    }

    async fn remove_all(&self, id: &ChatId) -> Result<(), StoreError> {
        self.bounded("remove_all", self.inner.remove_all(id)).await
    }

    async fn list_all(&self) -> Result<Vec<ChatId>, StoreError> {
        self.bounded("list_all", self.inner.list_all()).await
    }

    async fn add_if_absent(&self, id: &ChatId) -> Result<bool, StoreError> {
        self.bounded("add_if_absent", self.inner.add_if_absent(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledStore;

    #[async_trait]
    impl SubscriberStore for StalledStore {
        async fn append(&self, _id: &ChatId) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn remove_all(&self, _id: &ChatId) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn list_all(&self) -> Result<Vec<ChatId>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_timed_store_times_out_stalled_backend() {
        tokio::time::pause();
        let store = TimedStore::new(Arc::new(StalledStore), Duration::from_secs(2));

        let result = store.list_all().await;

        assert!(matches!(
            result,
            Err(StoreError::Timeout {
                operation: "list_all",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_timed_store_passes_through_results() {
        let inner = Arc::new(InMemoryStore::with_subscribers(["1", "2"]));
        let store = TimedStore::new(inner, Duration::from_secs(2));

        assert!(store.add_if_absent(&ChatId::from("3")).await.unwrap());
        store.remove_all(&ChatId::from("1")).await.unwrap();

        let ids = store.list_all().await.unwrap();
        assert_eq!(ids, vec![ChatId::from("2"), ChatId::from("3")]);
    }
}
