use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::record::Lock;

/// The client's owned-lease cache: `name` -> the last lock record this
/// client instance successfully wrote (via acquire or touch).
///
/// Shared between user tasks and the heartbeat worker: a plain
/// [`std::sync::Mutex`] around a [`HashMap`], cloned cheaply via an inner
/// `Arc`. A plain (non-async) mutex is deliberate: every critical section
/// here is a handful of map operations, never held across an `.await`, so
/// there is no need to pay for an async mutex.
#[derive(Debug, Clone, Default)]
pub(crate) struct LockCache(Arc<Mutex<HashMap<String, Lock>>>);

impl LockCache {
    pub(crate) fn insert(&self, lock: Lock) {
        let mut guard = self.0.lock().unwrap();
        guard.insert(lock.name.clone(), lock);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Lock> {
        self.0.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Lock> {
        self.0.lock().unwrap().remove(name)
    }

    /// Evicts `name` only if the cached entry is still at `version`, so the
    /// worker's eviction of a lease it could not renew can never clobber a
    /// newer entry the user just refreshed concurrently, nor a fresh insert
    /// for the same name by a racing acquire.
    pub(crate) fn remove_if_version(&self, name: &str, version: &str) {
        let mut guard = self.0.lock().unwrap();
        if let Some(existing) = guard.get(name) {
            if existing.version() == Some(version) {
                guard.remove(name);
            }
        }
    }

    /// A point-in-time snapshot of every cached entry, safe to iterate
    /// without holding the cache lock across a KV call.
    pub(crate) fn snapshot(&self) -> Vec<Lock> {
        self.0.lock().unwrap().values().cloned().collect()
    }
}
