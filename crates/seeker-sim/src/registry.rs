//! Arena of live items with stable handles.
//!
//! Sweeps iterate a snapshot of the store taken under a shared lock.
//! Registration and removal are queued as a changeset and applied in one
//! exclusive section at the start of the next sweep, so iteration never sees
//! the store change underneath it. The id lookup is updated immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use seeker_core::types::EntityId;

/// Stable handle of a registered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

enum Change<T> {
    Add(Handle, Arc<T>),
    Remove(Handle),
}

pub struct Registry<T> {
    store: RwLock<Vec<(Handle, Arc<T>)>>,
    pending: Mutex<Vec<Change<T>>>,
    lookup: RwLock<HashMap<EntityId, Arc<T>>>,
    next_handle: AtomicU64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            store: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            lookup: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `item` for addition and index it under every id in `ids`.
    pub fn register(&self, ids: &[EntityId], item: Arc<T>) -> Handle {
        let handle = Handle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        {
            let mut lookup = self.lookup.write();
            for id in ids {
                lookup.insert(*id, Arc::clone(&item));
            }
        }
        self.pending.lock().push(Change::Add(handle, item));
        handle
    }

    /// Queue removal and drop the ids from the index.
    pub fn unregister(&self, handle: Handle, ids: &[EntityId]) {
        {
            let mut lookup = self.lookup.write();
            for id in ids {
                lookup.remove(id);
            }
        }
        self.pending.lock().push(Change::Remove(handle));
    }

    /// Drop a single id from the index.
    pub fn forget(&self, id: EntityId) {
        self.lookup.write().remove(&id);
    }

    /// Apply queued changes. Returns false if the store was busy; the
    /// changes then stay queued for the next sweep.
    pub fn apply_pending(&self) -> bool {
        let Some(mut store) = self.store.try_write() else {
            return false;
        };
        let changes = std::mem::take(&mut *self.pending.lock());
        for change in changes {
            match change {
                Change::Add(handle, item) => store.push((handle, item)),
                Change::Remove(handle) => store.retain(|(h, _)| *h != handle),
            }
        }
        true
    }

    /// Clone of the current store.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.store.read().iter().map(|(_, item)| Arc::clone(item)).collect()
    }

    /// Item indexed under `id`.
    pub fn get(&self, id: EntityId) -> Option<Arc<T>> {
        self.lookup.read().get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.lookup.read().contains_key(&id)
    }

    /// Number of items in the store (excluding queued changes).
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Drop everything, queued changes included.
    pub fn clear(&self) {
        self.pending.lock().clear();
        self.store.write().clear();
        self.lookup.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_deferred_until_apply() {
        let registry = Registry::new();
        let handle = registry.register(&[EntityId(1), EntityId(2)], Arc::new("a"));
        assert!(registry.contains(EntityId(2)), "lookup updates immediately");
        assert!(registry.is_empty(), "store waits for the next sweep");

        assert!(registry.apply_pending());
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.snapshot()[0], "a");

        registry.unregister(handle, &[EntityId(1), EntityId(2)]);
        assert!(!registry.contains(EntityId(1)));
        assert_eq!(registry.len(), 1);
        registry.apply_pending();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_and_remove_in_same_sweep() {
        let registry = Registry::new();
        let handle = registry.register(&[EntityId(9)], Arc::new(9));
        registry.unregister(handle, &[EntityId(9)]);
        registry.apply_pending();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_apply_skipped_while_snapshot_lock_held() {
        let registry = Registry::new();
        registry.register(&[EntityId(1)], Arc::new(1));
        {
            let _reader = registry.store.read();
            assert!(!registry.apply_pending(), "busy store defers the changeset");
        }
        assert!(registry.apply_pending());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = Registry::new();
        let a = registry.register(&[EntityId(1)], Arc::new(()));
        let b = registry.register(&[EntityId(2)], Arc::new(()));
        assert_ne!(a, b);
    }
}
