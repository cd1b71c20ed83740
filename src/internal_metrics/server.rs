//! # Metrics Server
//!
//! This module defines the `MetricsServer`, which is responsible for running
//! an `axum`-based web server to expose the collected metrics to a Prometheus
//! scraper.
//!
//! The server provides a single endpoint, `/metrics`, which, when scraped,
//! returns the current state of all registered metrics in the Prometheus
//! exposition format. It stops serving once the application's shutdown
//! signal fires.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

/// A server that exposes metrics to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `prom_handle` - A `PrometheusHandle` used to render the metrics.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let prom_handle = self.prom_handle;
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let prom_handle = prom_handle.clone();
                async move { prom_handle.render() }
            }),
        );
        let mut shutdown_rx = self.shutdown_rx;

        async move {
            let shutdown = async move {
                shutdown_rx.changed().await.ok();
                trace!("Metrics server received shutdown signal.");
            };
            if let Err(e) = axum::serve(self.listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Metrics server error: {}", e);
            }
            trace!("Metrics server task finished.");
        }
    }
}
