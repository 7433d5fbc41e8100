//! Bounded worker pool for per-projectile steering and targeting work.

use tokio::runtime::{Builder, Runtime};
use tracing::error;

use seeker_core::error::FlightError;

pub struct WorkerPool {
    runtime: Runtime,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, FlightError> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .max_blocking_threads(threads)
            .thread_name("seeker-worker")
            .build()?;
        Ok(Self { runtime, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run every job on the pool and wait for all of them. A job that panics
    /// is logged and does not affect the others.
    pub fn run_batch<I, F>(&self, jobs: I)
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| self.runtime.spawn_blocking(job))
            .collect();
        if handles.is_empty() {
            return;
        }
        self.runtime.block_on(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "worker job failed");
                }
            }
        });
    }
}
