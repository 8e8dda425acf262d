// src/dependency/error_set.rs

//! Requests that were marked failed and will never publish.

use crate::types::{PipelineId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRequest {
    pub pipeline: PipelineId,
    pub request: RequestId,
}

/// Small set of errored (pipeline, request) pairs.
///
/// Entries age out once their request falls outside the in-flight window
/// of `depth` requests, which keeps the set bounded; lookups are linear.
#[derive(Debug, Clone)]
pub struct ErrorRequestSet {
    entries: Vec<ErrorRequest>,
    depth: u64,
}

impl ErrorRequestSet {
    pub fn new(depth: u64) -> Self {
        Self {
            entries: Vec::new(),
            depth,
        }
    }

    /// Returns `false` if the pair was already present.
    pub fn insert(&mut self, pipeline: PipelineId, request: RequestId) -> bool {
        if self.contains(pipeline, request) {
            return false;
        }
        self.entries.push(ErrorRequest { pipeline, request });
        true
    }

    pub fn contains(&self, pipeline: PipelineId, request: RequestId) -> bool {
        self.entries
            .iter()
            .any(|e| e.pipeline == pipeline && e.request == request)
    }

    /// Remove entries of `pipeline` that are older than the in-flight window
    /// relative to `newest`. Returns the number removed.
    pub fn prune(&mut self, pipeline: PipelineId, newest: RequestId) -> usize {
        let depth = self.depth;
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.pipeline == pipeline && e.request.saturating_add(depth) < newest));
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[ErrorRequest] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
