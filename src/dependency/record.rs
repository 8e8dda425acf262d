// src/dependency/record.rs

//! The scheduler-owned dependency record.

use std::fmt;
use std::sync::Arc;

use crate::dependency::key::{DependencyKey, WaitCategory};
use crate::dependency::unit::PropertyWait;
use crate::exec::ProcessingNode;
use crate::signal::{ExternalToken, TokenCallback, TokenSignal, UserData};
use crate::types::{FenceHandle, PipelineId, RequestId, StageIndex, TokenId, PREEMPTED_STAGE};

/// Handle of a dependency, unique for the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub u64);

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

/// Declared vs satisfied waits of one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitTally {
    pub declared: u32,
    pub satisfied: u32,
}

impl WaitTally {
    pub fn is_complete(&self) -> bool {
        self.satisfied >= self.declared
    }

    pub fn outstanding(&self) -> u32 {
        self.declared.saturating_sub(self.satisfied)
    }
}

/// A property wait together with the request id it resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPropertyWait {
    pub wait: PropertyWait,
    pub request: RequestId,
}

impl ResolvedPropertyWait {
    pub fn key(&self) -> DependencyKey {
        DependencyKey::property(self.request, self.wait.pipeline, self.wait.data)
    }
}

/// One scheduling unit: a node stage (or an external caller) waiting on zero
/// or more conditions.
///
/// Exactly one container owns a `Dependency` at any time: the deferred set,
/// the external-wait list, the ready queue, or a worker job. Index entries
/// only refer to it by [`DependencyId`].
pub struct Dependency {
    pub(crate) id: DependencyId,
    pub(crate) node: Option<Arc<dyn ProcessingNode>>,
    pub(crate) request_id: RequestId,
    pub(crate) pipeline_id: PipelineId,
    pub(crate) stage: StageIndex,
    pub(crate) properties: Vec<ResolvedPropertyWait>,
    pub(crate) fences: Vec<FenceHandle>,
    pub(crate) tokens: Vec<ExternalToken>,
    pub(crate) callback: Option<TokenCallback>,
    pub(crate) user_data: Option<UserData>,
    /// First token the caller declared, reported to the callback even if it
    /// had already signaled at registration.
    pub(crate) notify_token: Option<TokenId>,
    pub(crate) property_tally: WaitTally,
    pub(crate) fence_tally: WaitTally,
    pub(crate) token_tally: WaitTally,
    pub(crate) failed_waits: u32,
    pub(crate) preemptable: bool,
    pub(crate) internal: bool,
    pub(crate) bind_buffers: bool,
}

impl Dependency {
    pub(crate) fn new(
        id: DependencyId,
        node: Option<Arc<dyn ProcessingNode>>,
        request_id: RequestId,
        pipeline_id: PipelineId,
        stage: StageIndex,
    ) -> Self {
        Self {
            id,
            node,
            request_id,
            pipeline_id,
            stage,
            properties: Vec::new(),
            fences: Vec::new(),
            tokens: Vec::new(),
            callback: None,
            user_data: None,
            notify_token: None,
            property_tally: WaitTally::default(),
            fence_tally: WaitTally::default(),
            token_tally: WaitTally::default(),
            failed_waits: 0,
            preemptable: false,
            internal: false,
            bind_buffers: false,
        }
    }

    pub fn id(&self) -> DependencyId {
        self.id
    }

    pub fn node(&self) -> Option<&Arc<dyn ProcessingNode>> {
        self.node.as_ref()
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Pipeline of the owning node.
    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    pub fn stage(&self) -> StageIndex {
        self.stage
    }

    pub fn is_preempted(&self) -> bool {
        self.stage == PREEMPTED_STAGE
    }

    pub fn is_preemptable(&self) -> bool {
        self.preemptable
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn binds_buffers(&self) -> bool {
        self.bind_buffers
    }

    /// Waits that were satisfied by a failure signal.
    pub fn failed_waits(&self) -> u32 {
        self.failed_waits
    }

    pub fn property_waits(&self) -> &[ResolvedPropertyWait] {
        &self.properties
    }

    pub fn fences(&self) -> &[FenceHandle] {
        &self.fences
    }

    pub fn tokens(&self) -> &[ExternalToken] {
        &self.tokens
    }

    pub fn tally(&self, category: WaitCategory) -> WaitTally {
        match category {
            WaitCategory::Property => self.property_tally,
            WaitCategory::Fence => self.fence_tally,
            WaitCategory::Token => self.token_tally,
        }
    }

    /// Every key this dependency was indexed under.
    pub fn wait_keys(&self) -> Vec<DependencyKey> {
        self.properties
            .iter()
            .map(ResolvedPropertyWait::key)
            .chain(self.fences.iter().map(|f| DependencyKey::Fence(*f)))
            .chain(self.tokens.iter().map(|t| DependencyKey::Token(t.id())))
            .collect()
    }

    /// Whether any wait was declared at all.
    pub fn has_waits(&self) -> bool {
        self.property_tally.declared > 0
            || self.fence_tally.declared > 0
            || self.token_tally.declared > 0
    }

    /// Fully satisfied: every category's satisfied count reached its
    /// declared count.
    pub fn is_satisfied(&self) -> bool {
        self.property_tally.is_complete()
            && self.fence_tally.is_complete()
            && self.token_tally.is_complete()
    }

    pub(crate) fn record_signal(&mut self, category: WaitCategory, failed: bool) {
        let tally = match category {
            WaitCategory::Property => &mut self.property_tally,
            WaitCategory::Fence => &mut self.fence_tally,
            WaitCategory::Token => &mut self.token_tally,
        };
        tally.satisfied += 1;
        if failed {
            self.failed_waits += 1;
        }
    }

    /// Drop every outstanding wait and mark the dependency preempted.
    pub(crate) fn mark_preempted(&mut self) {
        self.property_tally.satisfied = self.property_tally.declared;
        self.fence_tally.satisfied = self.fence_tally.declared;
        self.token_tally.satisfied = self.token_tally.declared;
        self.stage = PREEMPTED_STAGE;
        self.bind_buffers = false;
    }

    /// Callback and payload to fire for the token part of this dependency.
    pub(crate) fn token_notification(&self, failed: bool) -> Option<(TokenCallback, TokenSignal)> {
        let callback = self.callback.clone()?;
        let token = self.notify_token?;
        Some((
            callback,
            TokenSignal {
                token,
                user_data: self.user_data.clone(),
                failed: failed || self.failed_waits > 0,
            },
        ))
    }

    /// Short label for log lines.
    pub fn owner_name(&self) -> &str {
        self.node.as_ref().map_or("<external>", |n| n.name())
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("owner", &self.owner_name())
            .field("request_id", &self.request_id)
            .field("pipeline_id", &self.pipeline_id)
            .field("stage", &self.stage)
            .field("properties", &self.property_tally)
            .field("fences", &self.fence_tally)
            .field("tokens", &self.token_tally)
            .field("failed_waits", &self.failed_waits)
            .field("preemptable", &self.preemptable)
            .field("internal", &self.internal)
            .field("bind_buffers", &self.bind_buffers)
            .finish()
    }
}
