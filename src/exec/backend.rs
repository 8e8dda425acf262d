// src/exec/backend.rs

//! Pluggable worker facility.
//!
//! The dispatcher talks to a `WorkerPool` instead of owning threads itself.
//! Production code uses [`TokioWorkerPool`](super::worker::TokioWorkerPool);
//! tests can provide a pool that queues jobs and runs them on demand.

use std::fmt;

use tracing::{debug, error, info};

use crate::dependency::Dependency;
use crate::engine::DeferredScheduler;
use crate::errors::Result;
use crate::exec::node::{StageRequest, StageStatus};

/// One dispatched dependency, ready to run on a worker.
pub struct Job {
    dependency: Dependency,
    scheduler: DeferredScheduler,
}

impl Job {
    pub(crate) fn new(dependency: Dependency, scheduler: DeferredScheduler) -> Self {
        Self {
            dependency,
            scheduler,
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Execute the node stage, feed its follow-on dependencies back into the
    /// scheduler and drain whatever became ready in the meantime.
    pub fn run(self) {
        let Job {
            dependency,
            scheduler,
        } = self;

        if let Some(node) = dependency.node() {
            let request = StageRequest {
                request_id: dependency.request_id(),
                stage: dependency.stage(),
                bind_buffers: dependency.binds_buffers(),
                internal: dependency.is_internal(),
                dependency_failed: dependency.failed_waits() > 0,
            };

            debug!(
                node = node.name(),
                request = request.request_id,
                stage = request.stage,
                preempted = request.is_preempted(),
                "executing node stage"
            );

            let result = node.execute(&request);
            match result.status {
                StageStatus::Success => {
                    for unit in result.dependencies {
                        if let Err(e) = scheduler.add_deferred(node.clone(), request.request_id, unit) {
                            error!(
                                node = node.name(),
                                request = request.request_id,
                                error = %e,
                                "failed to register follow-on dependency"
                            );
                        }
                    }
                }
                StageStatus::Cancelled => {
                    info!(
                        node = node.name(),
                        request = request.request_id,
                        stage = request.stage,
                        "node stage cancelled"
                    );
                }
                StageStatus::Failed(reason) => {
                    error!(
                        node = node.name(),
                        request = request.request_id,
                        stage = request.stage,
                        %reason,
                        "node stage failed"
                    );
                }
            }
        }

        scheduler.dispatch_ready();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("dependency", &self.dependency)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting where dispatched jobs run.
///
/// A pool must run each accepted job at most once. Rejecting a job with an
/// error drops it; the scheduler logs the failure and does not retry.
pub trait WorkerPool: Send + Sync {
    fn post(&self, job: Job) -> Result<()>;
}
