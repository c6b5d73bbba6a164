//! Blocking call hand-off
//!
//! Projector calls block on sockets, so they run on tokio's blocking pool.
//! A semaphore caps how many run at once.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor is closed")]
    Closed,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Bounded runner for blocking closures
#[derive(Debug, Clone)]
pub struct Executor {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl Executor {
    /// A zero worker count is raised to one.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `job` on the blocking pool and wait for its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        Ok(tokio::task::spawn_blocking(job).await?)
    }

    /// Stop accepting jobs; pending and future `run` calls fail with `Closed`.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}
