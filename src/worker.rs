//! Bounded execution for background operations.

use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default cap on concurrently running background operations.
pub(crate) const DEFAULT_MAX_BACKGROUND_TASKS: usize = 16;

/// Runs fire-and-forget operations with a cap on how many execute at once.
///
/// Tasks beyond the cap are spawned but wait for a permit before doing any
/// work, so a burst of calls cannot open an unbounded number of requests.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawn `work` on the Tokio runtime once a permit is free.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, T>(&self, name: &'static str, work: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = permits.acquire_owned().await;
            trace!(task = name, "background task started");
            work.await
        });
        TaskHandle { handle }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKGROUND_TASKS)
    }
}

/// Handle to a background operation.
///
/// Dropping it detaches the task; it keeps running to completion.
#[derive(Debug)]
pub struct TaskHandle<T> {
    handle: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task and return its output.
    pub async fn join(self) -> Result<T> {
        self.handle
            .await
            .map_err(|err| Error::TaskFailed(err.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task at its next await point.
    pub fn abort(&self) {
        self.handle.abort();
    }
}
