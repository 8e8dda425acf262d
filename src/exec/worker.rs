// src/exec/worker.rs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::errors::{Result, SchedulerError};
use crate::exec::backend::{Job, WorkerPool};

/// Worker facility backed by tokio's blocking thread pool.
///
/// Node stages are synchronous and may block, so each job runs through
/// `spawn_blocking` on the given runtime handle.
#[derive(Debug)]
pub struct TokioWorkerPool {
    name: String,
    handle: Handle,
    closed: AtomicBool,
    posted: AtomicU64,
}

impl TokioWorkerPool {
    pub fn new(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
            closed: AtomicBool::new(false),
            posted: AtomicU64::new(0),
        }
    }

    /// Pool on the runtime the caller is running in.
    ///
    /// Fails outside a tokio runtime.
    pub fn current(name: impl Into<String>) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| SchedulerError::Other(anyhow::anyhow!("no tokio runtime: {e}")))?;
        Ok(Self::new(name, handle))
    }

    /// Stop accepting jobs. Jobs already running are not interrupted.
    pub fn close(&self) {
        debug!(pool = %self.name, "closing worker pool");
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of jobs accepted so far.
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }
}

impl WorkerPool for TokioWorkerPool {
    fn post(&self, job: Job) -> Result<()> {
        if self.is_closed() {
            return Err(SchedulerError::WorkerRejected(format!(
                "pool '{}' is closed",
                self.name
            )));
        }

        trace!(pool = %self.name, dependency = %job.dependency().id(), "posting job");
        self.posted.fetch_add(1, Ordering::Relaxed);
        // The join handle is dropped; the job reports through the scheduler.
        drop(self.handle.spawn_blocking(move || job.run()));
        Ok(())
    }
}
