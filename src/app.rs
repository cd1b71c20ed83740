//! The main application logic, decoupled from the entry point.

use crate::{
    commands::CommandHandler,
    config::{Config, StoreBackend},
    core::{MessageSender, SubscriberStore},
    dispatch::Dispatcher,
    formatting::{AlertFormatter, MessageTemplates},
    internal_metrics::MetricsBuilder,
    server::{WebhookServer, WebhookState},
    store::{InMemoryStore, RedisStore, TimedStore},
    task_manager::TaskManager,
    telegram::{TelegramClient, UpdatePoller},
};
use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    webhook_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the alert webhook is bound to.
    pub fn webhook_addr(&self) -> SocketAddr {
        self.webhook_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.shutdown_rx();
        if !*shutdown_rx.borrow_and_update() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Every collaborator is constructed exactly once here and handed to the
/// components that need it. The store and the sender can be overridden, which
/// lets tests run the full application without Redis or Telegram.
pub struct AppBuilder {
    config: Config,
    store_override: Option<Arc<dyn SubscriberStore>>,
    sender_override: Option<Arc<dyn MessageSender>>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store_override: None,
            sender_override: None,
        }
    }

    /// Overrides the subscriber store backend.
    pub fn store_override(mut self, store: Arc<dyn SubscriberStore>) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Overrides the sender used for alert fan-out and command replies.
    pub fn sender_override(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender_override = Some(sender);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Initialize Metrics
        // =========================================================================
        let metrics_addr = match MetricsBuilder::new(config.metrics.clone())
            .build(task_manager.shutdown_rx())
            .await?
        {
            Some((server, addr)) => {
                info!(%addr, "Metrics server listening");
                task_manager.spawn("MetricsServer", server.run());
                Some(addr)
            }
            None => None,
        };

        // =========================================================================
        // 2. Templates
        // =========================================================================
        let templates = match &config.templates.dir {
            Some(dir) => MessageTemplates::from_dir(dir)
                .with_context(|| format!("loading templates from {}", dir.display()))?,
            None => {
                debug!("No template directory configured, using the built-in layout");
                MessageTemplates::builtin()?
            }
        };
        let formatter = Arc::new(AlertFormatter::new(templates));

        // =========================================================================
        // 3. Subscriber Store
        // =========================================================================
        let backend: Arc<dyn SubscriberStore> = match self.store_override {
            Some(store) => store,
            None => match config.store.backend {
                StoreBackend::Redis => Arc::new(
                    RedisStore::connect(
                        &config.store,
                        Duration::from_millis(config.dispatch.store_timeout_ms),
                    )
                    .await
                    .with_context(|| format!("connecting to Redis at {}", config.store.uri))?,
                ),
                StoreBackend::Memory => {
                    warn!("Using the in-memory subscriber store; subscriptions will not survive a restart");
                    Arc::new(InMemoryStore::new())
                }
            },
        };
        let store: Arc<dyn SubscriberStore> = Arc::new(TimedStore::new(
            backend,
            Duration::from_millis(config.dispatch.store_timeout_ms),
        ));

        // =========================================================================
        // 4. Telegram
        // =========================================================================
        let client = if self.sender_override.is_none() || config.telegram.polling {
            if config.telegram.bot_token.is_empty() {
                bail!("telegram.bot_token must be set (BOT_TOKEN or ALERTGRAM_TELEGRAM__BOT_TOKEN)");
            }
            Some(Arc::new(
                TelegramClient::new(&config.telegram).context("building Telegram client")?,
            ))
        } else {
            None
        };
        let sender: Arc<dyn MessageSender> = match self.sender_override {
            Some(sender) => sender,
            None => client.clone().context("no message sender configured")? as Arc<dyn MessageSender>,
        };

        // =========================================================================
        // 5. Core Services
        // =========================================================================
        let dispatcher = Arc::new(Dispatcher::new(
            sender.clone(),
            config.dispatch.order,
            Duration::from_millis(config.dispatch.send_timeout_ms),
        ));
        let command_handler = Arc::new(CommandHandler::new(store.clone()));

        // =========================================================================
        // 6. Webhook Server
        // =========================================================================
        let bind_address = config.server.bind_address();
        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("binding webhook server to {}", bind_address))?;
        let webhook_addr = listener
            .local_addr()
            .context("reading webhook server address")?;
        let state = Arc::new(WebhookState {
            formatter,
            dispatcher,
            store,
        });
        task_manager.spawn(
            "WebhookServer",
            WebhookServer::new(listener, state, task_manager.shutdown_rx()).run(),
        );
        info!(%webhook_addr, "Webhook server listening");

        // =========================================================================
        // 7. Chat Command Intake
        // =========================================================================
        match client {
            Some(client) if config.telegram.polling => {
                let poller = UpdatePoller::new(
                    client,
                    command_handler,
                    sender,
                    Duration::from_secs(config.telegram.poll_timeout_seconds),
                );
                task_manager.spawn("UpdatePoller", poller.run(task_manager.shutdown_rx()));
            }
            _ => info!("Telegram polling disabled; chat commands will not be processed"),
        }

        info!("alertgram initialized successfully.");

        Ok(App {
            task_manager,
            webhook_addr,
            metrics_addr,
        })
    }
}
