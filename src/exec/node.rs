// src/exec/node.rs

//! The processing-node contract.

use crate::dependency::DependencyUnit;
use crate::types::{PipelineId, RequestId, StageIndex, PREEMPTED_STAGE};

/// What a node is asked to run when one of its dependencies is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRequest {
    pub request_id: RequestId,
    pub stage: StageIndex,
    pub bind_buffers: bool,
    pub internal: bool,
    /// At least one wait of this stage was force-satisfied by a failure
    /// (errored request, failed publication, failed fence or token).
    pub dependency_failed: bool,
}

impl StageRequest {
    /// The stage was released early by preemption; its waits never fired.
    pub fn is_preempted(&self) -> bool {
        self.stage == PREEMPTED_STAGE
    }
}

/// Terminal status of one stage execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    /// The request is being torn down. Scheduled like a success.
    Cancelled,
    Failed(String),
}

/// What a node hands back after running a stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub status: StageStatus,
    /// Follow-on dependency units; only honoured on success.
    pub dependencies: Vec<DependencyUnit>,
}

impl StageResult {
    /// Stage finished and the node has nothing more to wait for.
    pub fn done() -> Self {
        Self {
            status: StageStatus::Success,
            dependencies: Vec::new(),
        }
    }

    /// Stage finished and the node wants to run again once `units` hold.
    pub fn then(units: impl IntoIterator<Item = DependencyUnit>) -> Self {
        Self {
            status: StageStatus::Success,
            dependencies: units.into_iter().collect(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: StageStatus::Cancelled,
            dependencies: Vec::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failed(reason.into()),
            dependencies: Vec::new(),
        }
    }
}

/// A node of the processing graph.
///
/// `execute` is called from worker threads. It may run concurrently for
/// different requests, but never twice at once for the same
/// (node, request, stage).
pub trait ProcessingNode: Send + Sync {
    fn name(&self) -> &str;

    /// Pipeline this node belongs to.
    fn pipeline_id(&self) -> PipelineId;

    /// Whether every dependency of this node may be released by global
    /// preemption, regardless of what its units declare.
    fn can_preempt_on_stop(&self) -> bool {
        false
    }

    fn execute(&self, request: &StageRequest) -> StageResult;
}
