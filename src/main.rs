//! alertgram - alert webhook to Telegram bridge
//!
//! Receives alert batches over HTTP and forwards each alert to every
//! subscribed chat. Chats manage their subscription with `/subscribe` and
//! `/unsubscribe`.

use alertgram::{app::App, cli::Cli, config::Config};
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        // Logging is not configured yet; fall back to the default subscriber.
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("alertgram starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Webhook Address: {}", config.server.bind_address());
    info!("Telegram API: {}", config.telegram.api_url);
    info!(
        "Telegram Polling: {}",
        if config.telegram.polling { "Enabled" } else { "Disabled" }
    );
    info!("Store Backend: {}", config.store.backend);
    info!("Store URI: {}", config.store.uri);
    info!("Store Key: {}", config.store.key);
    match &config.templates.dir {
        Some(dir) => info!("Templates: {}", dir.display()),
        None => info!("Templates: built-in"),
    }
    info!("Fan-out Order: {:?}", config.dispatch.order);
    info!("Send Timeout: {}ms", config.dispatch.send_timeout_ms);
    info!("Store Timeout: {}ms", config.dispatch.store_timeout_ms);
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received. Shutting down gracefully..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown_tx.send(true).ok();
    });

    app.run().await
}
