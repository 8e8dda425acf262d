use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dds::dependency::DependencyId;
use dds::errors::{Result, SchedulerError};
use dds::exec::{Job, WorkerPool};
use dds::types::{RequestId, StageIndex};
use parking_lot::Mutex;

/// What the scheduler posted, captured at post time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedJob {
    pub dependency: DependencyId,
    pub node: String,
    pub request: RequestId,
    pub stage: StageIndex,
    pub dependency_failed: bool,
}

/// A fake worker pool that:
/// - records every posted job
/// - queues jobs instead of running them, so tests decide when a node runs
/// - can be told to reject posts
#[derive(Default)]
pub struct RecordingWorkerPool {
    queue: Mutex<VecDeque<Job>>,
    posted: Mutex<Vec<PostedJob>>,
    reject: AtomicBool,
}

impl RecordingWorkerPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<PostedJob> {
        self.posted.lock().clone()
    }

    pub fn posted_count(&self) -> usize {
        self.posted.lock().len()
    }

    /// Jobs posted but not run yet.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest queued job. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job.run();
                true
            }
            None => false,
        }
    }

    /// Run queued jobs, including ones posted while running, until the
    /// queue is empty. Returns the number of jobs run.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
            assert!(ran < 10_000, "worker pool did not settle");
        }
        ran
    }
}

impl WorkerPool for RecordingWorkerPool {
    fn post(&self, job: Job) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SchedulerError::WorkerRejected("rejecting by request".to_string()));
        }

        let dep = job.dependency();
        self.posted.lock().push(PostedJob {
            dependency: dep.id(),
            node: dep.owner_name().to_string(),
            request: dep.request_id(),
            stage: dep.stage(),
            dependency_failed: dep.failed_waits() > 0,
        });
        self.queue.lock().push_back(job);
        Ok(())
    }
}
