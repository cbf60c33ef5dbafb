//! Per-stack named locks
//!
//! Serializes reconciliation per stack name within this process. A
//! second acquire for a held name fails immediately rather than
//! queueing: the caller is told to retry later.

use dashmap::DashMap;
use slipway_types::StackName;
use std::sync::Arc;

/// Registry of held stack locks
#[derive(Clone, Default)]
pub struct StackLocks {
    held: Arc<DashMap<StackName, ()>>,
}

impl StackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `name`, or `None` if it is already held.
    /// The lock is released when the returned guard drops.
    pub fn try_acquire(&self, name: &StackName) -> Option<StackLockGuard> {
        use dashmap::mapref::entry::Entry;
        match self.held.entry(name.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(StackLockGuard {
                    held: self.held.clone(),
                    name: name.clone(),
                })
            }
        }
    }

    pub fn is_held(&self, name: &StackName) -> bool {
        self.held.contains_key(name)
    }
}

/// RAII guard for one stack's lock
pub struct StackLockGuard {
    held: Arc<DashMap<StackName, ()>>,
    name: StackName,
}

impl StackLockGuard {
    /// Stack name this guard serializes
    pub fn stack(&self) -> &StackName {
        &self.name
    }
}

impl Drop for StackLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.name);
    }
}
