use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dds::errors::{Result, SchedulerError};
use dds::signal::{FenceBackend, FenceCallback, FenceResult, PropertyPool, PublicationObserver};
use dds::types::{DataId, FenceHandle, PipelineId, RequestId};
use parking_lot::Mutex;

/// In-memory property pool for one pipeline.
///
/// `publish` records the value before notifying observers, like a real
/// pool must.
pub struct FakePropertyPool {
    pipeline: PipelineId,
    published: Mutex<HashSet<(RequestId, DataId)>>,
    observers: Mutex<Vec<Arc<dyn PublicationObserver>>>,
}

impl FakePropertyPool {
    pub fn new(pipeline: PipelineId) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            published: Mutex::new(HashSet::new()),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    pub fn publish(&self, request: RequestId, data: DataId) {
        self.published.lock().insert((request, data));
        for observer in self.observers() {
            observer.on_published(data, request, self.pipeline);
        }
    }

    /// Report that `data` will never be published for `request`.
    pub fn fail(&self, request: RequestId, data: DataId) {
        for observer in self.observers() {
            observer.on_publish_failed(data, request, self.pipeline);
        }
    }

    /// Record a value as published without notifying anyone.
    pub fn preload(&self, request: RequestId, data: DataId) {
        self.published.lock().insert((request, data));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn observers(&self) -> Vec<Arc<dyn PublicationObserver>> {
        self.observers.lock().clone()
    }
}

impl PropertyPool for FakePropertyPool {
    fn is_published(&self, request: RequestId, data: DataId) -> bool {
        self.published.lock().contains(&(request, data))
    }

    fn subscribe(&self, observer: Arc<dyn PublicationObserver>) {
        self.observers.lock().push(observer);
    }
}

/// Fence backend whose fences are fired by the test.
#[derive(Default)]
pub struct FakeFenceBackend {
    signaled: Mutex<HashSet<FenceHandle>>,
    waits: Mutex<HashMap<FenceHandle, Vec<FenceCallback>>>,
    registrations: AtomicUsize,
    reject: AtomicBool,
}

impl FakeFenceBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark a fence signaled without firing any callback.
    pub fn presignal(&self, fence: FenceHandle) {
        self.signaled.lock().insert(fence);
    }

    /// Complete `fence` and run every callback waiting on it. Returns the
    /// number of callbacks run.
    pub fn signal(&self, fence: FenceHandle, result: FenceResult) -> usize {
        if result == FenceResult::Success {
            self.signaled.lock().insert(fence);
        }
        let callbacks = self.waits.lock().remove(&fence).unwrap_or_default();
        let count = callbacks.len();
        for callback in callbacks {
            callback(fence, result);
        }
        count
    }

    /// Callbacks registered and not yet fired for `fence`.
    pub fn pending(&self, fence: FenceHandle) -> usize {
        self.waits.lock().get(&fence).map_or(0, Vec::len)
    }

    /// Total `async_wait` calls accepted.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl FenceBackend for FakeFenceBackend {
    fn is_signaled(&self, fence: FenceHandle) -> bool {
        self.signaled.lock().contains(&fence)
    }

    fn async_wait(&self, fence: FenceHandle, callback: FenceCallback) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SchedulerError::FenceRegistration(format!("{fence} rejected")));
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.waits.lock().entry(fence).or_default().push(callback);
        Ok(())
    }
}
