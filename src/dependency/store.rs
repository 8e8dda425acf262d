// src/dependency/store.rs

//! The containers that own dependencies.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use crate::dependency::error_set::ErrorRequestSet;
use crate::dependency::index::KeyIndex;
use crate::dependency::key::DependencyKey;
use crate::dependency::record::{Dependency, DependencyId};
use crate::types::{DataId, PipelineId, RequestId};

/// Dependencies that became fully satisfied while resolving a key.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Node dependencies, to be moved to the ready queue.
    pub ready: Vec<Dependency>,
    /// External token waits, whose callbacks fire directly.
    pub notify: Vec<Dependency>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.notify.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Owner {
    Deferred,
    External,
}

/// State behind the scheduler's primary lock.
pub struct DeferredState {
    pub(crate) index: KeyIndex,
    pub(crate) deferred: IndexMap<DependencyId, Dependency>,
    pub(crate) external: IndexMap<DependencyId, Dependency>,
    pub(crate) errors: ErrorRequestSet,
    next_id: u64,
}

impl DeferredState {
    pub fn new(request_queue_depth: u64) -> Self {
        Self {
            index: KeyIndex::new(),
            deferred: IndexMap::new(),
            external: IndexMap::new(),
            errors: ErrorRequestSet::new(request_queue_depth),
            next_id: 1,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> DependencyId {
        let id = DependencyId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Index `dep` under every one of its keys and take ownership of it,
    /// in the deferred set or, for node-less waits, the external list.
    ///
    /// Returns the keys whose index entry this call created.
    pub(crate) fn register(&mut self, dep: Dependency) -> Vec<DependencyKey> {
        let id = dep.id;
        let mut created = Vec::new();

        for wait in &dep.properties {
            let key = wait.key();
            if self.index.put(key, id) {
                created.push(key);
            }
        }
        for fence in &dep.fences {
            let key = DependencyKey::Fence(*fence);
            if self.index.put(key, id) {
                created.push(key);
            }
        }
        for token in &dep.tokens {
            if self.index.put_token(token, id) {
                created.push(DependencyKey::Token(token.id()));
            }
        }

        if dep.node.is_some() {
            self.deferred.insert(id, dep);
        } else {
            self.external.insert(id, dep);
        }
        created
    }

    /// Count `key` as signaled for every dependency waiting on it and pull
    /// out the ones that are now fully satisfied.
    pub(crate) fn resolve(&mut self, key: &DependencyKey, failed: bool) -> Resolution {
        let category = key.category();
        let mut resolution = Resolution::default();

        for id in self.index.resolve(key) {
            let owner = if self.deferred.contains_key(&id) {
                Owner::Deferred
            } else if self.external.contains_key(&id) {
                Owner::External
            } else {
                warn!(%id, %key, "index referenced a dependency no container owns");
                continue;
            };

            let container = match owner {
                Owner::Deferred => &mut self.deferred,
                Owner::External => &mut self.external,
            };
            let Some(dep) = container.get_mut(&id) else {
                continue;
            };
            dep.record_signal(category, failed);
            if !dep.is_satisfied() {
                continue;
            }

            if let Some(dep) = container.shift_remove(&id) {
                match owner {
                    Owner::Deferred => resolution.ready.push(dep),
                    Owner::External => resolution.notify.push(dep),
                }
            }
        }

        resolution
    }

    /// Distinct data ids the deferred set waits on for (`pipeline`, `request`).
    pub(crate) fn waited_data_for(&self, pipeline: PipelineId, request: RequestId) -> Vec<DataId> {
        let mut data: IndexSet<DataId> = IndexSet::new();
        for dep in self.deferred.values() {
            for wait in &dep.properties {
                if wait.request == request && wait.wait.pipeline == pipeline {
                    data.insert(wait.wait.data);
                }
            }
        }
        data.into_iter().collect()
    }

    /// Remove every deferred dependency matching `pred` from the deferred
    /// set and drop its remaining index references.
    pub(crate) fn take_deferred_where(
        &mut self,
        mut pred: impl FnMut(&Dependency) -> bool,
    ) -> Vec<Dependency> {
        let ids: Vec<DependencyId> = self
            .deferred
            .values()
            .filter(|dep| pred(*dep))
            .map(|dep| dep.id)
            .collect();

        let mut taken = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(dep) = self.deferred.shift_remove(&id) {
                for key in dep.wait_keys() {
                    self.index.remove(&key, id);
                }
                taken.push(dep);
            }
        }
        taken
    }

    pub fn is_deferred(&self, id: DependencyId) -> bool {
        self.deferred.contains_key(&id)
    }

    pub fn is_external(&self, id: DependencyId) -> bool {
        self.external.contains_key(&id)
    }

    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    pub fn errors(&self) -> &ErrorRequestSet {
        &self.errors
    }

    pub fn deferred(&self) -> impl Iterator<Item = &Dependency> {
        self.deferred.values()
    }

    pub fn external(&self) -> impl Iterator<Item = &Dependency> {
        self.external.values()
    }
}

/// FIFO of fully satisfied dependencies, behind the secondary lock.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<Dependency>,
}

impl ReadyQueue {
    pub fn push(&mut self, dep: Dependency) {
        self.queue.push_back(dep);
    }

    pub fn pop(&mut self) -> Option<Dependency> {
        self.queue.pop_front()
    }

    pub fn contains(&self, id: DependencyId) -> bool {
        self.queue.iter().any(|dep| dep.id == id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }
}
