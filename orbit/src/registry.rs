//! Cycle registry: first-writer-wins ownership of canonical keys.
//!
//! The registry is the only structure mutated by more than one worker. Workers
//! may walk the same cycle redundantly (at-least-once computation); the
//! registry guarantees that exactly one of them owns the result (at-most-once
//! reporting).
//!
//! # Thread Safety
//!
//! Backed by a sharded [`DashMap`]. A claim takes the shard lock for the key
//! through [`DashMap::entry`], so the check and the insert are one atomic step.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::index::StateIndex;
use crate::scheduler::WorkerId;

/// Concurrent map `canonical_key → owning worker`, written at most once per key.
///
/// # Example
///
/// ```
/// use uor_orbit::registry::CycleRegistry;
/// use uor_orbit::{StateIndex, WorkerId};
///
/// let registry = CycleRegistry::new();
/// let key = StateIndex::new(2);
/// assert!(registry.claim(key, WorkerId::new(1)));
/// assert!(!registry.claim(key, WorkerId::new(0)));
/// assert_eq!(registry.owner(key), Some(WorkerId::new(1)));
/// ```
#[derive(Debug, Default)]
pub struct CycleRegistry {
    owners: DashMap<StateIndex, WorkerId>,
}

impl CycleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
        }
    }

    /// Claims `key` for `worker`.
    ///
    /// Returns true iff this call is the first claim of `key`. Re-claiming a
    /// key, even by its owner, returns false.
    pub fn claim(&self, key: StateIndex, worker: WorkerId) -> bool {
        match self.owners.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(worker);
                true
            }
        }
    }

    /// Owner of `key`, if claimed.
    #[must_use]
    pub fn owner(&self, key: StateIndex) -> Option<WorkerId> {
        self.owners.get(&key).map(|entry| *entry.value())
    }

    /// Returns true if `key` has been claimed.
    #[must_use]
    pub fn is_claimed(&self, key: StateIndex) -> bool {
        self.owners.contains_key(&key)
    }

    /// Number of claimed cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns true if nothing has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let registry = CycleRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.claim(StateIndex::new(5), WorkerId::new(3)));
        assert!(!registry.claim(StateIndex::new(5), WorkerId::new(3)));
        assert!(registry.claim(StateIndex::new(6), WorkerId::new(0)));
        assert_eq!(registry.len(), 2);
        assert!(registry.is_claimed(StateIndex::new(6)));
        assert_eq!(registry.owner(StateIndex::new(7)), None);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner_per_key() {
        let registry = CycleRegistry::new();
        let wins = AtomicUsize::new(0);
        thread::scope(|s| {
            for w in 0..8 {
                let registry = &registry;
                let wins = &wins;
                s.spawn(move || {
                    for key in 0..500u64 {
                        if registry.claim(StateIndex::new(key), WorkerId::new(w)) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(wins.load(Ordering::Relaxed), 500);
        assert_eq!(registry.len(), 500);
    }
}
