//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing
//! application metrics.
//!
//! ## Components:
//!
//! - **`describe_metrics`**: Registers a description and unit for every metric
//!   the application emits. Call sites record values directly through the
//!   `metrics` macros.
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder and binds the listener for the
//!   metrics server.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;

/// Registers descriptions for all supported metrics with the global recorder.
pub fn describe_metrics() {
    metrics::describe_counter!("webhooks_received_total", Unit::Count, "Total number of alert webhook requests, labeled by outcome.");
    metrics::describe_counter!("alerts_rendered_total", Unit::Count, "Total number of alerts rendered into chat messages.");
    metrics::describe_counter!("messages_sent_total", Unit::Count, "Total number of message sends to subscribers, labeled by outcome.");
    metrics::describe_histogram!("dispatch_duration_seconds", Unit::Seconds, "Time taken to fan a batch of messages out to all subscribers.");
    metrics::describe_counter!("commands_handled_total", Unit::Count, "Total number of chat commands handled, labeled by command.");
    metrics::describe_counter!("store_errors_total", Unit::Count, "Total number of failed subscriber store operations, labeled by operation.");
}

/// Builder for the metrics system.
///
/// This builder is responsible for initializing the `PrometheusRecorder` and
/// creating the `MetricsServer`.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system.
    ///
    /// Returns `None` when metrics are disabled in the configuration. The
    /// returned server has not been spawned yet.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Option<(MetricsServer, SocketAddr)>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .context("configuring histogram buckets")?
            .build_recorder();
        let handle = recorder.handle();

        // Bind the listener before installing the recorder so a bad address
        // fails startup without leaving a recorder behind.
        let listener = TcpListener::bind(self.config.listen_address)
            .await
            .with_context(|| format!("binding metrics server to {}", self.config.listen_address))?;
        let addr = listener
            .local_addr()
            .context("reading metrics server address")?;

        metrics::set_global_recorder(recorder)
            .map_err(|_| anyhow::anyhow!("a global metrics recorder is already installed"))?;
        describe_metrics();

        Ok(Some((MetricsServer::new(listener, handle, shutdown_rx), addr)))
    }
}
