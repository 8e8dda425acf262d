// src/engine/preemption.rs

//! Forced early release of deferred dependencies.
//!
//! A preempted dependency is moved to the ready queue with its stage set to
//! [`PREEMPTED_STAGE`](crate::types::PREEMPTED_STAGE) and buffer binding
//! cleared, so the node can tell it never got what it waited for.

use tracing::{debug, info};

use crate::dependency::Dependency;
use crate::engine::scheduler::DeferredScheduler;
use crate::types::PipelineId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreemptionMode {
    #[default]
    Disabled,
    /// Every preemptable, non-internal dependency.
    Global,
    /// Every dependency owned by a node of this pipeline.
    Pipeline(PipelineId),
}

impl PreemptionMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PreemptionMode::Disabled)
    }

    pub fn qualifies(&self, dep: &Dependency) -> bool {
        match *self {
            PreemptionMode::Disabled => false,
            PreemptionMode::Global => dep.is_preemptable() && !dep.is_internal(),
            PreemptionMode::Pipeline(pipeline) => dep.node().is_some() && dep.pipeline_id() == pipeline,
        }
    }
}

impl DeferredScheduler {
    pub fn preemption(&self) -> PreemptionMode {
        *self.inner.preemption.lock()
    }

    pub fn set_preemption(&self, mode: PreemptionMode) {
        let previous = std::mem::replace(&mut *self.inner.preemption.lock(), mode);
        if previous != mode {
            info!(?previous, ?mode, "preemption mode changed");
        }
    }

    /// Move every qualifying deferred dependency to the ready queue.
    ///
    /// Does nothing while preemption is disabled. Does not dispatch.
    /// Returns the number of dependencies preempted.
    pub fn preempt(&self) -> usize {
        let mode = self.preemption();
        if !mode.is_enabled() {
            return 0;
        }

        let mut state = self.inner.state.lock();
        let preempted = state.take_deferred_where(|dep| mode.qualifies(dep));
        if preempted.is_empty() {
            return 0;
        }

        let count = preempted.len();
        let mut queue = self.inner.ready.lock();
        for mut dep in preempted {
            debug!(
                node = dep.owner_name(),
                request = dep.request_id(),
                stage = dep.stage(),
                "dependency preempted"
            );
            dep.mark_preempted();
            queue.push(dep);
        }
        info!(?mode, count, "preempted deferred dependencies");
        count
    }
}
