//! The alert webhook.
//!
//! Every path is served by one handler. A request is decoded, rendered in
//! full and only then fanned out, so a bad payload or a broken template never
//! results in a partial send.

use crate::core::{AlertBatch, DecodeError, RenderedMessage, SubscriberStore};
use crate::dispatch::Dispatcher;
use crate::formatting::{AlertFormatter, FormatError};
use crate::store::StoreError;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

/// Dependencies shared by every webhook request.
pub struct WebhookState {
    pub formatter: Arc<AlertFormatter>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn SubscriberStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("failed to read subscribers: {0}")]
    Store(#[from] StoreError),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed(_) => StatusCode::BAD_REQUEST,
            WebhookError::Decode(_) | WebhookError::Format(_) | WebhookError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            WebhookError::MethodNotAllowed(_) => "bad_method",
            WebhookError::Decode(_) => "decode_error",
            WebhookError::Format(_) => "format_error",
            WebhookError::Store(_) => "store_error",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match &self {
            WebhookError::MethodNotAllowed(_) => warn!(error = %self, "Rejected webhook request"),
            _ => error!(error = %self, "Failed to process webhook request"),
        }
        metrics::counter!("webhooks_received_total", "outcome" => self.outcome()).increment(1);
        self.status().into_response()
    }
}

/// Builds the webhook router.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new().fallback(handle_webhook).with_state(state)
}

#[instrument(skip_all, fields(%method, %uri, %remote))]
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    debug!("Webhook request received");
    if method != Method::POST {
        return Err(WebhookError::MethodNotAllowed(method));
    }

    let batch = AlertBatch::from_json(&body)?;
    info!(status = %batch.status, alerts = batch.alerts.len(), "Received alert batch");

    let messages: Vec<RenderedMessage> = state.formatter.render(&batch).collect::<Result<_, _>>()?;
    metrics::counter!("alerts_rendered_total").increment(messages.len() as u64);

    let report = state.dispatcher.deliver(state.store.as_ref(), &messages).await?;
    info!(
        attempted = report.attempted(),
        delivered = report.delivered(),
        failed = report.failed(),
        "Alert batch processed"
    );
    metrics::counter!("webhooks_received_total", "outcome" => "ok").increment(1);
    Ok(StatusCode::OK)
}

/// The HTTP server for the alert webhook.
pub struct WebhookServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl WebhookServer {
    pub fn new(listener: TcpListener, state: Arc<WebhookState>, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router: router(state),
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until the shutdown signal fires.
    /// In-flight requests are allowed to finish.
    pub fn run(self) -> impl Future<Output = ()> {
        let mut shutdown_rx = self.shutdown_rx;
        let service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        async move {
            let shutdown = async move {
                shutdown_rx.changed().await.ok();
                trace!("Webhook server received shutdown signal.");
            };
            if let Err(e) = axum::serve(self.listener, service)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Webhook server error: {}", e);
            }
            info!("Webhook server finished.");
        }
    }
}
