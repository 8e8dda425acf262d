// src/engine/scheduler.rs

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::config::SchedulerConfig;
use crate::dependency::record::ResolvedPropertyWait;
use crate::dependency::{DeferredState, Dependency, DependencyId, DependencyKey, DependencyUnit, ReadyQueue};
use crate::engine::diagnostics::SchedulerStats;
use crate::engine::preemption::PreemptionMode;
use crate::errors::{Result, SchedulerError};
use crate::exec::{ProcessingNode, WorkerPool};
use crate::signal::{
    ExternalToken, FenceBackend, FenceCallback, FenceResult, PropertyPool, PublicationObserver, TokenCallback,
    TokenKind, UserData,
};
use crate::types::{
    DataId, FenceHandle, PipelineId, RequestId, MAX_FENCE_WAITS, MAX_PIPELINES_PER_SESSION, MAX_PROPERTY_WAITS,
    MAX_TOKEN_WAITS,
};

pub(crate) struct Inner {
    pub(crate) config: SchedulerConfig,
    /// Primary lock: index, deferred set, external waits, error requests.
    pub(crate) state: Mutex<DeferredState>,
    /// Secondary lock, always taken after `state` when both are needed.
    pub(crate) ready: Mutex<ReadyQueue>,
    pub(crate) pools: Vec<Arc<dyn PropertyPool>>,
    pub(crate) fences: Option<Arc<dyn FenceBackend>>,
    pub(crate) workers: Arc<dyn WorkerPool>,
    pub(crate) preemption: Mutex<PreemptionMode>,
}

/// Per-session deferred dependency scheduler.
///
/// Nodes report what their next stage waits on through
/// [`add_deferred`](Self::add_deferred); published data, hardware fences and
/// external tokens resolve those waits, and fully satisfied dependencies are
/// posted to the worker pool. Cloning the handle is cheap and every clone
/// drives the same scheduler.
#[derive(Clone)]
pub struct DeferredScheduler {
    pub(crate) inner: Arc<Inner>,
}

/// Non-owning handle, used by callbacks registered with collaborators.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<Inner>,
}

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<DeferredScheduler> {
        self.inner.upgrade().map(|inner| DeferredScheduler { inner })
    }
}

/// Builder for [`DeferredScheduler`].
///
/// Pipelines are numbered in the order their pools are added.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    workers: Option<Arc<dyn WorkerPool>>,
    pools: Vec<Arc<dyn PropertyPool>>,
    fences: Option<Arc<dyn FenceBackend>>,
    preemption: PreemptionMode,
}

impl SchedulerBuilder {
    pub fn worker_pool(mut self, workers: Arc<dyn WorkerPool>) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn pipeline_pool(mut self, pool: Arc<dyn PropertyPool>) -> Self {
        self.pools.push(pool);
        self
    }

    pub fn fence_backend(mut self, fences: Arc<dyn FenceBackend>) -> Self {
        self.fences = Some(fences);
        self
    }

    pub fn preemption(mut self, mode: PreemptionMode) -> Self {
        self.preemption = mode;
        self
    }

    pub fn build(self) -> Result<DeferredScheduler> {
        let workers = self.workers.ok_or(SchedulerError::MissingWorkerPool)?;
        if self.pools.is_empty() || self.pools.len() > MAX_PIPELINES_PER_SESSION {
            return Err(SchedulerError::NoPipelines {
                count: self.pools.len(),
                max: MAX_PIPELINES_PER_SESSION,
            });
        }

        let inner = Inner {
            state: Mutex::new(DeferredState::new(self.config.request_queue_depth)),
            ready: Mutex::new(ReadyQueue::default()),
            pools: self.pools,
            fences: self.fences,
            workers,
            preemption: Mutex::new(self.preemption),
            config: self.config,
        };
        let scheduler = DeferredScheduler { inner: Arc::new(inner) };

        let observer: Arc<dyn PublicationObserver> = Arc::new(SchedulerObserver {
            scheduler: scheduler.downgrade(),
        });
        for pool in &scheduler.inner.pools {
            pool.subscribe(observer.clone());
        }

        info!(
            name = %scheduler.inner.config.name,
            pipelines = scheduler.inner.pools.len(),
            request_queue_depth = scheduler.inner.config.request_queue_depth,
            fences = scheduler.inner.fences.is_some(),
            "deferred scheduler created"
        );
        Ok(scheduler)
    }
}

/// Where a fence completion is routed.
enum FenceTarget {
    /// Hardware-fence wait of a dependency.
    Hardware,
    /// Fence backing an external token.
    Token(ExternalToken),
}

/// An async wait to register with the fence backend once the primary lock
/// is released.
pub(crate) struct FenceRegistration {
    fence: FenceHandle,
    target: FenceTarget,
    pipeline: PipelineId,
    request: RequestId,
}

impl DeferredScheduler {
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder {
            config,
            workers: None,
            pools: Vec::new(),
            fences: None,
            preemption: PreemptionMode::Disabled,
        }
    }

    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn pipeline_count(&self) -> usize {
        self.inner.pools.len()
    }

    fn check_pipeline(&self, pipeline: PipelineId) -> Result<()> {
        let count = self.inner.pools.len();
        if pipeline as usize >= count {
            return Err(SchedulerError::PipelineOutOfRange { pipeline, count });
        }
        Ok(())
    }

    fn check_unit(&self, unit: &DependencyUnit) -> Result<()> {
        let tokens = unit.tokens.as_ref().map_or(0, |t| t.tokens.len());
        for (kind, count, max) in [
            ("property", unit.properties.len(), MAX_PROPERTY_WAITS),
            ("fence", unit.fences.len(), MAX_FENCE_WAITS),
            ("token", tokens, MAX_TOKEN_WAITS),
        ] {
            if count > max {
                return Err(SchedulerError::TooManyWaits { kind, count, max });
            }
        }
        for wait in &unit.properties {
            self.check_pipeline(wait.pipeline)?;
        }
        if let Some(wait) = &unit.tokens {
            if wait.callback.is_some() && wait.tokens.is_empty() {
                return Err(SchedulerError::EmptyTokenWait);
            }
            self.check_tokens(&wait.tokens)?;
        }
        Ok(())
    }

    /// Fence-backed tokens can only complete through a fence backend.
    fn check_tokens(&self, tokens: &[ExternalToken]) -> Result<()> {
        if self.inner.fences.is_some() {
            return Ok(());
        }
        match tokens.iter().find(|t| matches!(t.kind(), TokenKind::Fence(_))) {
            Some(token) => Err(SchedulerError::FenceRegistration(format!(
                "{} is fence-backed but no fence backend is configured",
                token.id()
            ))),
            None => Ok(()),
        }
    }

    /// Register the waits of `node`'s next stage for `request`.
    ///
    /// Waits that already hold (published data, errored requests, signaled
    /// fences and tokens) are dropped up front. A dependency left with no
    /// wait goes straight to the ready queue; otherwise it is deferred until
    /// every wait resolves. Nothing is registered if the unit is rejected.
    ///
    /// Does not dispatch; call [`dispatch_ready`](Self::dispatch_ready) or
    /// let the running job do it.
    pub fn add_deferred(
        &self,
        node: Arc<dyn ProcessingNode>,
        request: RequestId,
        unit: DependencyUnit,
    ) -> Result<DependencyId> {
        self.check_pipeline(node.pipeline_id())?;
        self.check_unit(&unit)?;

        let verbose = self.inner.config.verbose_logging;
        let (id, registrations) = {
            let mut state = self.inner.state.lock();
            let id = state.allocate_id();
            let preemptable = unit.preemptable || node.can_preempt_on_stop();
            let mut dep = Dependency::new(id, Some(node.clone()), request, node.pipeline_id(), unit.stage);
            dep.preemptable = preemptable;
            dep.internal = unit.internal;
            dep.bind_buffers = unit.bind_buffers;

            let mut seen: HashSet<DependencyKey> = HashSet::new();
            for wait in unit.properties {
                let resolved = ResolvedPropertyWait {
                    wait,
                    request: wait.resolve_request(request),
                };
                let key = resolved.key();
                if !seen.insert(key) {
                    continue;
                }
                if state.errors.contains(wait.pipeline, resolved.request) {
                    dep.failed_waits += 1;
                    if verbose {
                        debug!(node = node.name(), %key, "skipping wait on errored request");
                    }
                    continue;
                }
                if self.is_published(wait.pipeline, resolved.request, wait.data) {
                    if verbose {
                        debug!(node = node.name(), %key, "skipping wait on published data");
                    }
                    continue;
                }
                dep.properties.push(resolved);
            }

            for fence in unit.fences {
                if !seen.insert(DependencyKey::Fence(fence)) || self.fence_signaled(fence) {
                    continue;
                }
                dep.fences.push(fence);
            }

            if let Some(tokens) = unit.tokens {
                dep.notify_token = tokens.tokens.first().map(ExternalToken::id);
                for token in tokens.tokens {
                    if !seen.insert(DependencyKey::Token(token.id())) {
                        continue;
                    }
                    if token.is_signaled() {
                        if token.has_failed() {
                            dep.failed_waits += 1;
                        }
                        continue;
                    }
                    dep.tokens.push(token);
                }
                dep.callback = tokens.callback;
                dep.user_data = tokens.user_data;
            }

            let registrations = self.enqueue_locked(&mut state, dep);
            (id, registrations)
        };

        self.register_fence_waits(registrations);
        Ok(id)
    }

    /// Wait for external `tokens` without a node; `callback` fires once all
    /// of them have signaled.
    ///
    /// If every token has already signaled the callback runs before this
    /// returns, reporting a failure if any of them failed. Fence-backed
    /// tokens are rejected when no fence backend is configured.
    pub fn wait_for_tokens(
        &self,
        tokens: Vec<ExternalToken>,
        callback: TokenCallback,
        user_data: Option<UserData>,
    ) -> Result<DependencyId> {
        if tokens.is_empty() {
            return Err(SchedulerError::EmptyTokenWait);
        }
        if tokens.len() > MAX_TOKEN_WAITS {
            return Err(SchedulerError::TooManyWaits {
                kind: "token",
                count: tokens.len(),
                max: MAX_TOKEN_WAITS,
            });
        }
        self.check_tokens(&tokens)?;

        let first = tokens.first().map(ExternalToken::id);
        let (id, registrations, immediate) = {
            let mut state = self.inner.state.lock();
            let id = state.allocate_id();
            let mut dep = Dependency::new(id, None, 0, 0, 0);
            dep.callback = Some(callback);
            dep.user_data = user_data;
            dep.notify_token = first;

            let mut seen = HashSet::new();
            for token in tokens {
                if !seen.insert(token.id()) {
                    continue;
                }
                if token.is_signaled() {
                    if token.has_failed() {
                        dep.failed_waits += 1;
                    }
                    continue;
                }
                dep.tokens.push(token);
            }

            if dep.tokens.is_empty() {
                (id, Vec::new(), Some(dep))
            } else {
                dep.token_tally.declared = dep.tokens.len() as u32;
                let registrations = self.fence_registrations(&dep);
                let created = state.register(dep);
                let registrations = retain_created(registrations, &created);
                (id, registrations, None)
            }
        };

        debug!(dependency = %id, token = ?first, immediate = immediate.is_some(), "external token wait registered");
        if let Some(dep) = immediate {
            self.fire_token_callbacks(vec![dep], false);
        }
        self.register_fence_waits(registrations);
        Ok(id)
    }

    /// Drop all in-flight work: the index, error requests, deferred
    /// dependencies and the ready queue.
    ///
    /// External waits are released too; their callbacks fire with
    /// `failed = true`. Returns what was dropped.
    pub fn flush(&self) -> SchedulerStats {
        let (stats, external) = {
            let mut state = self.inner.state.lock();
            let index_keys = state.index.clear();
            let error_requests = state.errors.clear();
            let deferred = state.deferred.len();
            state.deferred.clear();
            let external: Vec<Dependency> = state.external.drain(..).map(|(_, dep)| dep).collect();
            let ready = self.inner.ready.lock().clear();
            let stats = SchedulerStats {
                deferred,
                ready,
                external_waits: external.len(),
                index_keys,
                error_requests,
            };
            (stats, external)
        };

        info!(
            name = %self.inner.config.name,
            deferred = stats.deferred,
            ready = stats.ready,
            external_waits = stats.external_waits,
            "scheduler flushed"
        );
        self.fire_token_callbacks(external, true);
        stats
    }

    /// Place a fully built dependency: ready queue if it has nothing to wait
    /// for, deferred set otherwise.
    fn enqueue_locked(&self, state: &mut DeferredState, mut dep: Dependency) -> Vec<FenceRegistration> {
        dep.property_tally.declared = dep.properties.len() as u32;
        dep.fence_tally.declared = dep.fences.len() as u32;
        dep.token_tally.declared = dep.tokens.len() as u32;

        if !dep.has_waits() {
            debug!(
                node = dep.owner_name(),
                request = dep.request_id,
                stage = dep.stage,
                dependency = %dep.id,
                "dependency ready immediately"
            );
            self.inner.ready.lock().push(dep);
            return Vec::new();
        }

        if self.inner.config.verbose_logging {
            for key in dep.wait_keys() {
                debug!(node = dep.owner_name(), request = dep.request_id, stage = dep.stage, %key, "waiting");
            }
        }
        trace!(dependency = %dep.id, node = dep.owner_name(), "dependency deferred");

        let registrations = self.fence_registrations(&dep);
        let created = state.register(dep);
        retain_created(registrations, &created)
    }

    fn fence_registrations(&self, dep: &Dependency) -> Vec<FenceRegistration> {
        if self.inner.fences.is_none() {
            return Vec::new();
        }
        let hardware = dep.fences.iter().map(|fence| FenceRegistration {
            fence: *fence,
            target: FenceTarget::Hardware,
            pipeline: dep.pipeline_id,
            request: dep.request_id,
        });
        let tokens = dep.tokens.iter().filter_map(|token| match token.kind() {
            TokenKind::Fence(fence) => Some(FenceRegistration {
                fence,
                target: FenceTarget::Token(token.clone()),
                pipeline: dep.pipeline_id,
                request: dep.request_id,
            }),
            TokenKind::External => None,
        });
        hardware.chain(tokens).collect()
    }

    /// Hand fence waits to the backend. Must be called without any lock.
    fn register_fence_waits(&self, registrations: Vec<FenceRegistration>) {
        let Some(backend) = self.inner.fences.clone() else {
            return;
        };

        for registration in registrations {
            let FenceRegistration {
                fence,
                target,
                pipeline,
                request,
            } = registration;
            let token = match &target {
                FenceTarget::Token(token) => Some(token.clone()),
                FenceTarget::Hardware => None,
            };

            let weak = self.downgrade();
            let callback: FenceCallback = Box::new(move |fence, result| {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.fence_completed(target, fence, pipeline, request, result);
                }
            });

            if let Err(e) = backend.async_wait(fence, callback) {
                error!(%fence, pipeline, request, error = %e, "fence wait registration failed; releasing waiters");
                match token {
                    Some(token) => self.on_token_signaled(&token, false),
                    None => self.on_fence_error(pipeline, fence, request, false),
                }
            }
        }
    }

    fn fence_completed(
        &self,
        target: FenceTarget,
        fence: FenceHandle,
        pipeline: PipelineId,
        request: RequestId,
        result: FenceResult,
    ) {
        match (target, result) {
            (FenceTarget::Hardware, FenceResult::Success) => self.on_fence_signaled(fence),
            (FenceTarget::Hardware, FenceResult::Failed) => self.on_fence_error(pipeline, fence, request, false),
            (FenceTarget::Hardware, FenceResult::Cancelled) => self.on_fence_error(pipeline, fence, request, true),
            (FenceTarget::Token(token), result) => self.on_token_signaled(&token, result == FenceResult::Success),
        }
    }

    fn is_published(&self, pipeline: PipelineId, request: RequestId, data: DataId) -> bool {
        self.inner
            .pools
            .get(pipeline as usize)
            .is_some_and(|pool| pool.is_published(request, data))
    }

    fn fence_signaled(&self, fence: FenceHandle) -> bool {
        self.inner.fences.as_ref().is_some_and(|backend| backend.is_signaled(fence))
    }

    /// Invoke the callbacks of released external waits. Must be called
    /// without any lock.
    pub(crate) fn fire_token_callbacks(&self, deps: Vec<Dependency>, failed: bool) {
        for dep in deps {
            if let Some((callback, signal)) = dep.token_notification(failed) {
                debug!(dependency = %dep.id, token = %signal.token, failed = signal.failed, "token wait complete");
                callback(&signal);
            }
        }
    }
}

fn retain_created(registrations: Vec<FenceRegistration>, created: &[DependencyKey]) -> Vec<FenceRegistration> {
    registrations
        .into_iter()
        .filter(|r| {
            let key = match &r.target {
                FenceTarget::Hardware => DependencyKey::Fence(r.fence),
                FenceTarget::Token(token) => DependencyKey::Token(token.id()),
            };
            created.contains(&key)
        })
        .collect()
}

impl fmt::Debug for DeferredScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("name", &self.inner.config.name)
            .field("pipelines", &self.inner.pools.len())
            .finish_non_exhaustive()
    }
}

/// Subscribed to every property pool; holds the scheduler weakly so pools
/// never keep it alive.
struct SchedulerObserver {
    scheduler: WeakScheduler,
}

impl PublicationObserver for SchedulerObserver {
    fn on_published(&self, data: DataId, request: RequestId, pipeline: PipelineId) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.on_published(data, request, pipeline);
        }
    }

    fn on_publish_failed(&self, data: DataId, request: RequestId, pipeline: PipelineId) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.on_publish_failed(data, request, pipeline);
        }
    }
}
