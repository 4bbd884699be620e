//! Live session registry.
//!
//! The [`SessionRegistry`] maps session ids to the command handles of their
//! workers and hands out fresh session ids.
//!
//! # Design
//!
//! - **Owned table**: one map behind a lock, shared by the runtime handle, the
//!   session workers (rematches register new sessions) and the persistence
//!   worker (ended sessions are removed after archiving)
//! - **Short critical sections**: the lock is never held across an await, so
//!   a slow store write can never stall command routing
//! - **Monotonic ids**: recovered sessions advance the allocator past their ids

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::task::JoinHandle;

use battle_core::SessionId;

use crate::workers::SessionHandle;

struct Entry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Hands out a session id that has not been used in this process.
    pub fn allocate_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Makes sure `id` is never allocated again.
    pub fn observe_id(&self, id: SessionId) {
        self.next_id
            .fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }

    pub fn insert(&self, handle: SessionHandle, task: JoinHandle<()>) {
        self.write().insert(handle.id(), Entry { handle, task });
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.read().get(&id).map(|entry| entry.handle.clone())
    }

    /// Drops the registry's handle; the worker stops once no other handle is left.
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.write().remove(&id).map(|entry| entry.handle)
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.read().values().map(|entry| entry.handle.clone()).collect()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Empties the registry, returning the worker tasks so they can be joined.
    pub fn drain(&self) -> Vec<JoinHandle<()>> {
        self.write().drain().map(|(_, entry)| entry.task).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_ids_are_never_reallocated() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.allocate_id(), SessionId(1));
        registry.observe_id(SessionId(41));
        assert_eq!(registry.allocate_id(), SessionId(42));
        // Observing a lower id does not move the allocator back.
        registry.observe_id(SessionId(3));
        assert_eq!(registry.allocate_id(), SessionId(43));
    }
}
