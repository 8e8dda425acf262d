// src/engine/dispatcher.rs

use tracing::{error, trace};

use crate::dependency::Dependency;
use crate::engine::scheduler::DeferredScheduler;
use crate::exec::Job;

impl DeferredScheduler {
    /// Drain the ready queue into the worker pool.
    ///
    /// When preemption is enabled, qualifying deferred dependencies are
    /// released first. The ready-queue lock is held only while popping, so
    /// concurrent callers share the work and each dependency leaves the
    /// queue exactly once. Returns the number of dependencies taken.
    pub fn dispatch_ready(&self) -> usize {
        if self.preemption().is_enabled() {
            self.preempt();
        }

        let mut dispatched = 0;
        loop {
            let next = self.inner.ready.lock().pop();
            let Some(dep) = next else {
                break;
            };
            self.execute_dependency(dep);
            dispatched += 1;
        }
        dispatched
    }

    fn execute_dependency(&self, dep: Dependency) {
        if let Some((callback, signal)) = dep.token_notification(false) {
            callback(&signal);
        }

        let Some(node) = dep.node().cloned() else {
            trace!(dependency = %dep.id(), "token-only dependency notified");
            return;
        };

        let id = dep.id();
        let request = dep.request_id();
        let stage = dep.stage();
        trace!(node = node.name(), request, stage, dependency = %id, "posting dependency");

        if let Err(e) = self.inner.workers.post(Job::new(dep, self.clone())) {
            error!(
                node = node.name(),
                request,
                stage,
                dependency = %id,
                error = %e,
                "failed to post dependency to worker pool"
            );
        }
    }
}
