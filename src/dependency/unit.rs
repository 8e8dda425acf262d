// src/dependency/unit.rs

//! What a node declares when it finishes a stage.

use std::fmt;

use crate::signal::{ExternalToken, TokenCallback, UserData};
use crate::types::{DataId, FenceHandle, PipelineId, RequestId, StageIndex, FIRST_VALID_REQUEST_ID};

/// Wait on a piece of data published by some pipeline for some request.
///
/// The request is expressed relative to the request the dependency belongs
/// to: `offset` requests back, or ahead when `negate` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyWait {
    pub data: DataId,
    pub pipeline: PipelineId,
    pub offset: u64,
    pub negate: bool,
}

impl PropertyWait {
    /// Wait on `data` for the dependency's own request.
    pub fn current(data: DataId, pipeline: PipelineId) -> Self {
        Self {
            data,
            pipeline,
            offset: 0,
            negate: false,
        }
    }

    /// Wait on `data` published `offset` requests earlier.
    pub fn previous(data: DataId, pipeline: PipelineId, offset: u64) -> Self {
        Self {
            data,
            pipeline,
            offset,
            negate: false,
        }
    }

    /// Wait on `data` published `offset` requests later.
    pub fn ahead(data: DataId, pipeline: PipelineId, offset: u64) -> Self {
        Self {
            data,
            pipeline,
            offset,
            negate: true,
        }
    }

    /// Request id this wait refers to, clamped to [`FIRST_VALID_REQUEST_ID`].
    pub fn resolve_request(&self, current: RequestId) -> RequestId {
        if self.negate {
            current.saturating_add(self.offset)
        } else if self.offset >= current {
            FIRST_VALID_REQUEST_ID
        } else {
            (current - self.offset).max(FIRST_VALID_REQUEST_ID)
        }
    }
}

/// Wait on external tokens, with an optional completion callback.
#[derive(Clone, Default)]
pub struct TokenWait {
    pub tokens: Vec<ExternalToken>,
    pub callback: Option<TokenCallback>,
    pub user_data: Option<UserData>,
}

impl fmt::Debug for TokenWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenWait")
            .field("tokens", &self.tokens)
            .field("has_callback", &self.callback.is_some())
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// Dependencies a node reports for its next stage.
#[derive(Debug, Clone, Default)]
pub struct DependencyUnit {
    /// Stage the node wants to run once every wait is satisfied.
    pub stage: StageIndex,
    pub properties: Vec<PropertyWait>,
    /// Input-buffer fences.
    pub fences: Vec<FenceHandle>,
    pub tokens: Option<TokenWait>,
    /// May be force-satisfied by global preemption.
    pub preemptable: bool,
    /// Stage is internal to the node framework; exempt from global preemption.
    pub internal: bool,
    /// Node wants its input/output buffers bound before the stage runs.
    pub bind_buffers: bool,
}

impl DependencyUnit {
    pub fn new(stage: StageIndex) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn wait_property(mut self, wait: PropertyWait) -> Self {
        self.properties.push(wait);
        self
    }

    pub fn wait_fence(mut self, fence: FenceHandle) -> Self {
        self.fences.push(fence);
        self
    }

    pub fn wait_token(mut self, token: ExternalToken) -> Self {
        self.tokens.get_or_insert_with(TokenWait::default).tokens.push(token);
        self
    }

    /// Callback invoked by the dispatcher before the stage is posted.
    ///
    /// Needs at least one [`wait_token`](Self::wait_token); a unit with a
    /// callback and no token is rejected by the scheduler.
    pub fn on_tokens_ready(mut self, callback: TokenCallback, user_data: Option<UserData>) -> Self {
        let wait = self.tokens.get_or_insert_with(TokenWait::default);
        wait.callback = Some(callback);
        wait.user_data = user_data;
        self
    }

    pub fn preemptable(mut self) -> Self {
        self.preemptable = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn bind_buffers(mut self) -> Self {
        self.bind_buffers = true;
        self
    }

    /// Whether the unit declares no wait at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.fences.is_empty()
            && self.tokens.as_ref().is_none_or(|t| t.tokens.is_empty())
    }
}
