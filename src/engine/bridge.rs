// src/engine/bridge.rs

//! Satisfaction bridge: the one place where fired wait conditions change
//! scheduler state.
//!
//! Property publications, hardware fences, external tokens and errored
//! requests all end up in [`DeferredScheduler::update`]. A failed signal
//! advances the waiters exactly like a successful one, so nothing stays
//! blocked on a condition that will never hold; the failure is remembered
//! on the dependency and reported to the node when it runs.

use tracing::{debug, error, info, warn};

use crate::dependency::{DeferredState, Dependency, DependencyKey, Resolution};
use crate::engine::scheduler::DeferredScheduler;
use crate::engine::{SchedulerEvent, SignalEvent};
use crate::signal::ExternalToken;
use crate::types::{DataId, FenceHandle, PipelineId, RequestId};

impl DeferredScheduler {
    /// Feed one event into the scheduler.
    ///
    /// Returns `false` once the event asks the consumer to stop.
    pub fn apply(&self, event: SchedulerEvent) -> bool {
        match event {
            SchedulerEvent::Signal(signal) => self.apply_signal(signal),
            SchedulerEvent::RequestErrored {
                pipeline,
                request,
                is_flush,
            } => self.mark_errored(pipeline, request, is_flush),
            SchedulerEvent::Flush => {
                self.flush();
            }
            SchedulerEvent::Shutdown => return false,
        }
        true
    }

    fn apply_signal(&self, signal: SignalEvent) {
        match signal {
            SignalEvent::Published {
                data,
                request,
                pipeline,
            } => self.on_published(data, request, pipeline),
            SignalEvent::PublishFailed {
                data,
                request,
                pipeline,
            } => self.on_publish_failed(data, request, pipeline),
            SignalEvent::FenceSignaled(fence) => self.on_fence_signaled(fence),
            SignalEvent::FenceFailed {
                fence,
                pipeline,
                request,
                is_flush,
            } => self.on_fence_error(pipeline, fence, request, is_flush),
            SignalEvent::TokenSignaled { token, success } => self.on_token_signaled(&token, success),
        }
    }

    pub fn on_published(&self, data: DataId, request: RequestId, pipeline: PipelineId) {
        self.update(DependencyKey::property(request, pipeline, data), true, false);
        self.dispatch_ready();
    }

    pub fn on_publish_failed(&self, data: DataId, request: RequestId, pipeline: PipelineId) {
        self.update(DependencyKey::property(request, pipeline, data), false, false);
        self.dispatch_ready();
    }

    pub fn on_fence_signaled(&self, fence: FenceHandle) {
        self.update(DependencyKey::Fence(fence), true, false);
        self.dispatch_ready();
    }

    /// A hardware fence errored: mark its request failed and release the
    /// fence's waiters.
    pub fn on_fence_error(&self, pipeline: PipelineId, fence: FenceHandle, request: RequestId, is_flush: bool) {
        let released = {
            let mut state = self.inner.state.lock();
            let mut released = self.mark_errored_locked(&mut state, pipeline, request, is_flush);
            released.extend(self.update_locked(&mut state, &DependencyKey::Fence(fence), false, is_flush));
            released
        };
        self.fire_token_callbacks(released, false);
        self.dispatch_ready();
    }

    /// An external token reached its terminal state.
    ///
    /// A token keeps its first result; signaling it again resolves any
    /// waiters with that recorded result.
    pub fn on_token_signaled(&self, token: &ExternalToken, success: bool) {
        if !token.mark_signaled(success) {
            debug!(token = %token.id(), state = ?token.state(), "token already signaled");
        }
        self.update(DependencyKey::Token(token.id()), !token.has_failed(), false);
        self.dispatch_ready();
    }

    /// Mark `request` on `pipeline` as never completing and force-satisfy
    /// every deferred property wait on it.
    ///
    /// Marking an already errored request does nothing.
    pub fn mark_errored(&self, pipeline: PipelineId, request: RequestId, is_flush: bool) {
        let released = {
            let mut state = self.inner.state.lock();
            self.mark_errored_locked(&mut state, pipeline, request, is_flush)
        };
        self.fire_token_callbacks(released, false);
        self.dispatch_ready();
    }

    pub fn is_errored(&self, pipeline: PipelineId, request: RequestId) -> bool {
        self.inner.state.lock().errors.contains(pipeline, request)
    }

    /// Forget errored requests of `pipeline` that fell out of the in-flight
    /// window ending at `newest`. Returns the number removed.
    pub fn prune_errors(&self, pipeline: PipelineId, newest: RequestId) -> usize {
        self.inner.state.lock().errors.prune(pipeline, newest)
    }

    fn mark_errored_locked(
        &self,
        state: &mut DeferredState,
        pipeline: PipelineId,
        request: RequestId,
        is_flush: bool,
    ) -> Vec<Dependency> {
        if !state.errors.insert(pipeline, request) {
            debug!(pipeline, request, "request already marked errored");
            return Vec::new();
        }
        let pruned = state.errors.prune(pipeline, request);
        if is_flush {
            info!(pipeline, request, pruned, "request errored by flush");
        } else {
            warn!(pipeline, request, pruned, "request errored");
        }

        let mut released = Vec::new();
        for data in state.waited_data_for(pipeline, request) {
            let key = DependencyKey::property(request, pipeline, data);
            released.extend(self.update_locked(state, &key, false, is_flush));
        }
        released
    }

    /// Resolve `key` and release the external waits it completed.
    pub(crate) fn update(&self, key: DependencyKey, success: bool, is_flush: bool) {
        let released = {
            let mut state = self.inner.state.lock();
            self.update_locked(&mut state, &key, success, is_flush)
        };
        self.fire_token_callbacks(released, false);
    }

    /// Resolve `key` under the primary lock. Satisfied node dependencies move
    /// to the ready queue; completed external waits are returned so their
    /// callbacks can fire once the lock is released.
    pub(crate) fn update_locked(
        &self,
        state: &mut DeferredState,
        key: &DependencyKey,
        success: bool,
        is_flush: bool,
    ) -> Vec<Dependency> {
        if !success {
            if is_flush {
                info!(%key, "wait released by flush");
            } else {
                error!(%key, "wait satisfied by failure");
            }
        } else if let DependencyKey::Property {
            request, pipeline, ..
        } = *key
        {
            let pruned = state.errors.prune(pipeline, request);
            if pruned > 0 {
                debug!(pipeline, request, pruned, "pruned aged error requests");
            }
        }

        let Resolution { ready, notify } = state.resolve(key, !success);
        if ready.is_empty() {
            return notify;
        }

        if self.inner.config.verbose_logging {
            for dep in &ready {
                debug!(
                    node = dep.owner_name(),
                    request = dep.request_id(),
                    stage = dep.stage(),
                    %key,
                    "dependency satisfied"
                );
            }
        }

        let mut queue = self.inner.ready.lock();
        for dep in ready {
            queue.push(dep);
        }
        notify
    }
}
