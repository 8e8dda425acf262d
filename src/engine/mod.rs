// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the scheduler handle and its builder ([`scheduler`])
//! - the satisfaction bridge that every signal funnels through ([`bridge`])
//! - the dispatcher that drains the ready queue into the worker pool
//!   ([`dispatcher`])
//! - the preemption controller ([`preemption`])
//! - counters and state dumps ([`diagnostics`])
//! - an async pump feeding channel events into the scheduler ([`runtime`])
//!
//! All signal sources are normalised into [`SignalEvent`]s and consumed by
//! [`DeferredScheduler::apply`].

use crate::signal::ExternalToken;
use crate::types::{DataId, FenceHandle, PipelineId, RequestId};

/// A wait condition fired.
#[derive(Debug, Clone)]
pub enum SignalEvent {
    /// A property pool published `data` for `request`.
    Published {
        data: DataId,
        request: RequestId,
        pipeline: PipelineId,
    },
    /// A property pool will never publish `data` for `request`.
    PublishFailed {
        data: DataId,
        request: RequestId,
        pipeline: PipelineId,
    },
    FenceSignaled(FenceHandle),
    /// A hardware fence errored; `request` on `pipeline` is marked failed.
    FenceFailed {
        fence: FenceHandle,
        pipeline: PipelineId,
        request: RequestId,
        is_flush: bool,
    },
    TokenSignaled {
        token: ExternalToken,
        success: bool,
    },
}

/// Everything the scheduler's state machine consumes.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Signal(SignalEvent),
    /// The request will never complete on `pipeline`.
    RequestErrored {
        pipeline: PipelineId,
        request: RequestId,
        is_flush: bool,
    },
    /// Drop all in-flight work.
    Flush,
    /// Stop the signal pump.
    Shutdown,
}

impl From<SignalEvent> for SchedulerEvent {
    fn from(event: SignalEvent) -> Self {
        SchedulerEvent::Signal(event)
    }
}

pub mod bridge;
pub mod diagnostics;
pub mod dispatcher;
pub mod preemption;
pub mod runtime;
pub mod scheduler;

pub use diagnostics::SchedulerStats;
pub use preemption::PreemptionMode;
pub use runtime::SignalPump;
pub use scheduler::{DeferredScheduler, SchedulerBuilder, WeakScheduler};
