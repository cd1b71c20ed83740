//! Tracks the long-running tasks of the bridge.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Owns the webhook server, the update poller and the metrics server tasks.
///
/// Every task is expected to watch the shutdown receiver handed out by
/// [`TaskManager::shutdown_rx`] and return once it changes.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns `future` and keeps its handle for shutdown.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name, handle));
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Awaits every spawned task, reporting any that panicked.
    pub async fn shutdown(self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        info!("Waiting for {} tasks to complete...", handles.len());

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut panicked = 0;
        for (task_name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name, error = %e, "Task panicked during shutdown.");
                    panicked += 1;
                }
            }
        }

        if panicked == 0 {
            info!("All tasks shut down gracefully.");
        } else {
            error!("{} tasks panicked during shutdown.", panicked);
        }
    }
}
