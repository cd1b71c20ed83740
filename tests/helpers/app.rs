//! Test helpers for running the full application instance.

use super::mock_sender::RecordingSender;
use alertgram::{app::App, config::Config, store::InMemoryStore, SubscriberStore};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running application bound to an ephemeral port, with the subscriber
/// store and the chat sender replaced by in-process fakes.
pub struct TestApp {
    pub addr: SocketAddr,
    pub sender: RecordingSender,
    shutdown_tx: watch::Sender<bool>,
    app_handle: JoinHandle<Result<()>>,
    client: reqwest::Client,
}

pub struct TestAppBuilder {
    config: Config,
    store: Arc<dyn SubscriberStore>,
    sender: RecordingSender,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.telegram.polling = false;
        config.dispatch.send_timeout_ms = 1_000;
        Self {
            config,
            store: Arc::new(InMemoryStore::new()),
            sender: RecordingSender::new(),
        }
    }

    pub fn with_subscribers(mut self, ids: &[&str]) -> Self {
        self.store = Arc::new(InMemoryStore::with_subscribers(ids.iter().copied()));
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SubscriberStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sender(mut self, sender: RecordingSender) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_config(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = App::builder(self.config)
            .store_override(self.store)
            .sender_override(Arc::new(self.sender.clone()))
            .build(shutdown_rx)
            .await?;
        let addr = app.webhook_addr();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            addr,
            sender: self.sender,
            shutdown_tx,
            app_handle,
            client: reqwest::Client::new(),
        })
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::new()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_alerts(&self, body: &str) -> reqwest::Response {
        self.client
            .post(self.url("/"))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("webhook request failed")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("webhook request failed")
    }

    /// Signals shutdown and waits for every task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let TestApp {
            shutdown_tx,
            app_handle,
            client,
            ..
        } = self;
        // Idle keep-alive connections would hold the server open.
        drop(client);
        shutdown_tx.send(true)?;
        timeout(Duration::from_secs(5), app_handle).await???;
        Ok(())
    }
}
