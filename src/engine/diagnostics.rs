// src/engine/diagnostics.rs

use std::fmt::Write as _;

use crate::dependency::{DependencyId, DependencyKey, ErrorRequest};
use crate::engine::scheduler::DeferredScheduler;

/// Snapshot of container sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub deferred: usize,
    pub ready: usize,
    pub external_waits: usize,
    pub index_keys: usize,
    pub error_requests: usize,
}

impl SchedulerStats {
    /// No dependency is held anywhere.
    pub fn is_idle(&self) -> bool {
        self.deferred == 0 && self.ready == 0 && self.external_waits == 0
    }
}

impl DeferredScheduler {
    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock();
        let ready = self.inner.ready.lock().len();
        SchedulerStats {
            deferred: state.deferred.len(),
            ready,
            external_waits: state.external.len(),
            index_keys: state.index.len(),
            error_requests: state.errors.len(),
        }
    }

    pub fn is_deferred(&self, id: DependencyId) -> bool {
        self.inner.state.lock().is_deferred(id)
    }

    pub fn is_external_wait(&self, id: DependencyId) -> bool {
        self.inner.state.lock().is_external(id)
    }

    pub fn is_ready(&self, id: DependencyId) -> bool {
        self.inner.ready.lock().contains(id)
    }

    /// Whether `id` is currently indexed under `key`.
    pub fn is_waiting_on(&self, id: DependencyId, key: &DependencyKey) -> bool {
        self.inner.state.lock().index.waiters(key).contains(&id)
    }

    pub fn index_contains(&self, key: &DependencyKey) -> bool {
        self.inner.state.lock().index.contains(key)
    }

    pub fn error_requests(&self) -> Vec<ErrorRequest> {
        self.inner.state.lock().errors.entries().to_vec()
    }

    /// Human-readable dump of deferred dependencies, external waits and
    /// the keys they are still waiting on.
    ///
    /// Never blocks: if a lock is held elsewhere the dump says so instead.
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "scheduler '{}'", self.inner.config.name);

        match self.inner.ready.try_lock() {
            Some(queue) => {
                let _ = writeln!(out, "  ready: {}", queue.len());
            }
            None => {
                let _ = writeln!(out, "  ready: <locked>");
            }
        }

        let Some(state) = self.inner.state.try_lock() else {
            let _ = writeln!(out, "  deferred state: <locked>");
            return out;
        };

        let _ = writeln!(out, "  deferred ({}):", state.deferred.len());
        for dep in state.deferred() {
            let _ = writeln!(
                out,
                "    {} node={} request={} stage={} preemptable={} internal={}",
                dep.id(),
                dep.owner_name(),
                dep.request_id(),
                dep.stage(),
                dep.is_preemptable(),
                dep.is_internal()
            );
            for key in dep.wait_keys() {
                if state.index.waiters(&key).contains(&dep.id()) {
                    let _ = writeln!(out, "      waiting on {key}");
                }
            }
        }

        let _ = writeln!(out, "  external waits ({}):", state.external.len());
        for dep in state.external() {
            let outstanding: Vec<String> = dep
                .wait_keys()
                .into_iter()
                .filter(|key| state.index.contains(key))
                .map(|key| key.to_string())
                .collect();
            let _ = writeln!(out, "    {} waiting on [{}]", dep.id(), outstanding.join(", "));
        }

        let _ = writeln!(out, "  error requests ({}):", state.errors.len());
        for entry in state.errors.entries() {
            let _ = writeln!(out, "    pipeline={} request={}", entry.pipeline, entry.request);
        }
        let _ = writeln!(out, "  index keys: {}", state.index.len());
        out
    }
}
