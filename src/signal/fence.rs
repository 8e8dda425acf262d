// src/signal/fence.rs

use crate::errors::Result;
use crate::types::FenceHandle;

/// Terminal state reported for a hardware fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceResult {
    Success,
    Failed,
    /// The fence was torn down as part of a flush.
    Cancelled,
}

/// Completion callback registered through [`FenceBackend::async_wait`].
///
/// Anything the caller needs back (the "user data") is captured by the
/// closure.
pub type FenceCallback = Box<dyn FnOnce(FenceHandle, FenceResult) + Send + 'static>;

/// Hardware fence primitive.
pub trait FenceBackend: Send + Sync {
    /// Whether the fence has already signaled.
    fn is_signaled(&self, fence: FenceHandle) -> bool {
        let _ = fence;
        false
    }

    /// Invoke `callback` once the fence reaches a terminal state.
    ///
    /// The callback may run on any thread, including synchronously inside
    /// this call; the scheduler never holds a lock while registering.
    fn async_wait(&self, fence: FenceHandle, callback: FenceCallback) -> Result<()>;
}
