// src/dependency/index.rs

//! Map from wait key to the dependencies waiting on it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use indexmap::IndexSet;

use crate::dependency::key::DependencyKey;
use crate::dependency::record::DependencyId;
use crate::signal::ExternalToken;

/// Waiters of one key, in registration order.
///
/// Token keys also hold the token itself; its wait reference is released
/// when the entry goes away.
struct KeyEntry {
    waiters: IndexSet<DependencyId>,
    token: Option<ExternalToken>,
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        if let Some(token) = &self.token {
            token.release_wait();
        }
    }
}

/// Key index guarded by the scheduler's primary lock.
///
/// An entry exists only while at least one dependency waits on its key.
#[derive(Default)]
pub struct KeyIndex {
    entries: HashMap<DependencyKey, KeyEntry>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` as waiting on `key`.
    ///
    /// Returns `true` if this created the key's entry.
    pub fn put(&mut self, key: DependencyKey, id: DependencyId) -> bool {
        self.put_entry(key, id, None)
    }

    /// Register `id` as waiting on `token`, taking a wait reference on the
    /// token when its entry is created.
    pub fn put_token(&mut self, token: &ExternalToken, id: DependencyId) -> bool {
        self.put_entry(DependencyKey::Token(token.id()), id, Some(token))
    }

    fn put_entry(&mut self, key: DependencyKey, id: DependencyId, token: Option<&ExternalToken>) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().waiters.insert(id);
                false
            }
            Entry::Vacant(slot) => {
                let mut waiters = IndexSet::new();
                waiters.insert(id);
                let token = token.cloned();
                if let Some(token) = &token {
                    token.acquire_wait();
                }
                slot.insert(KeyEntry { waiters, token });
                true
            }
        }
    }

    /// Remove the key and hand back everything that was waiting on it.
    pub fn resolve(&mut self, key: &DependencyKey) -> Vec<DependencyId> {
        match self.entries.remove(key) {
            Some(mut entry) => std::mem::take(&mut entry.waiters).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Drop one waiter from a key without counting it satisfied.
    ///
    /// Returns whether `id` was waiting on `key`.
    pub fn remove(&mut self, key: &DependencyKey, id: DependencyId) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = entry.waiters.shift_remove(&id);
        if entry.waiters.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn waiters(&self, key: &DependencyKey) -> Vec<DependencyId> {
        self.entries
            .get(key)
            .map(|entry| entry.waiters.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, releasing token references.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
