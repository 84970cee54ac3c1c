//! Registry of detached batch coordinators.
//!
//! A coordinator keeps running after its consumer disconnects so that tools with
//! external side effects finish. Registering the coordinators here lets shutdown
//! wait for them.

// std::sync::Mutex: the lock is never held across an .await.
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tracks spawned tasks so they can be awaited on shutdown.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task and register its handle before returning.
    pub fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);

        let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        guard.retain(|h| !h.is_finished());
        guard.push(handle);
    }

    /// Wait for every registered task to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<_> =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));

        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Waiting for in-flight batches to complete");

        for (i, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                warn!(task = i, error = %e, "Batch coordinator panicked");
            }
        }

        info!("All in-flight batches completed");
    }

    /// Number of tasks still running.
    pub fn pending_count(&self) -> usize {
        let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        guard.retain(|h| !h.is_finished());
        guard.len()
    }
}
