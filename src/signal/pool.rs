// src/signal/pool.rs

use std::sync::Arc;

use crate::types::{DataId, PipelineId, RequestId};

/// Receiver of publication events from a property pool.
///
/// The scheduler implements this; both methods funnel into its satisfaction
/// bridge.
pub trait PublicationObserver: Send + Sync {
    fn on_published(&self, data: DataId, request: RequestId, pipeline: PipelineId);
    fn on_publish_failed(&self, data: DataId, request: RequestId, pipeline: PipelineId);
}

/// Key/value store of per-request data for one pipeline.
///
/// A pool must record a value as published *before* it notifies observers,
/// otherwise a wait registered in between could miss the notification.
/// `is_published` is called while the scheduler holds its primary lock and
/// must not call back into the scheduler.
pub trait PropertyPool: Send + Sync {
    /// Whether `data` has already been published for `request`.
    fn is_published(&self, request: RequestId, data: DataId) -> bool;

    /// Register an observer for every publication on this pool.
    ///
    /// The default implementation ignores the observer; such pools must be
    /// driven through the scheduler's `on_published` entry points instead.
    fn subscribe(&self, observer: Arc<dyn PublicationObserver>) {
        let _ = observer;
    }
}
