//! Worker-local visited tracker.
//!
//! A dense bitset over `[0, N)`, one bit per state. Each worker owns one; it
//! bounds redundant cycle walks within that worker. Trackers are never shared
//! while workers run. The sequential fallback merges them with
//! [`VisitedSet::union_with`] before completing the census.

use alloc::vec;
use alloc::vec::Vec;

use crate::index::StateIndex;

/// Dense bitset of visited state indices.
///
/// Size: `ceil(N / 64)` words, whatever share of the space a worker is
/// assigned. A parallel run holds one set per worker plus one for the
/// fallback pass, so peak tracker memory is `(workers + 1) × N / 8` bytes:
/// 8 workers over `N = 2^34` need about 18 GiB.
///
/// # Example
///
/// ```
/// use uor_orbit::visited::VisitedSet;
/// use uor_orbit::StateIndex;
///
/// let mut seen = VisitedSet::new(100);
/// assert!(seen.insert(StateIndex::new(42)));
/// assert!(!seen.insert(StateIndex::new(42)));
/// assert!(seen.contains(StateIndex::new(42)));
/// assert_eq!(seen.len(), 1);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct VisitedSet {
    words: Vec<u64>,
    capacity: u64,
}

impl VisitedSet {
    /// Creates an empty set for the state space `[0, capacity)`.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let words = usize::try_from(capacity.div_ceil(64)).unwrap_or(usize::MAX);
        Self {
            words: vec![0; words],
            capacity,
        }
    }

    /// Size of the state space this set covers.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Marks `index` visited. Returns true if it was not visited before.
    ///
    /// Indices outside `[0, capacity)` are ignored and return false.
    #[inline]
    pub fn insert(&mut self, index: StateIndex) -> bool {
        if !index.is_within(self.capacity) {
            return false;
        }
        let word = index.as_usize() >> 6;
        let bit = 1u64 << (index.value() & 63);
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Tests membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: StateIndex) -> bool {
        if !index.is_within(self.capacity) {
            return false;
        }
        (self.words[index.as_usize() >> 6] >> (index.value() & 63)) & 1 == 1
    }

    /// Population count.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Returns true if nothing has been visited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Adds every member of `other` to this set.
    ///
    /// Sets of different capacity are merged over their common prefix.
    pub fn union_with(&mut self, other: &Self) {
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= *theirs;
        }
    }

    /// Iterates unvisited indices in ascending order.
    pub fn iter_unvisited(&self) -> impl Iterator<Item = StateIndex> + '_ {
        (0..self.capacity)
            .map(StateIndex::new)
            .filter(move |&index| !self.contains(index))
    }
}

impl core::fmt::Debug for VisitedSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VisitedSet({}/{})", self.len(), self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundaries() {
        let mut set = VisitedSet::new(130);
        for i in [0u64, 63, 64, 127, 128, 129] {
            assert!(set.insert(StateIndex::new(i)));
        }
        assert_eq!(set.len(), 6);
        assert!(set.contains(StateIndex::new(64)));
        assert!(!set.contains(StateIndex::new(65)));
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut set = VisitedSet::new(10);
        assert!(!set.insert(StateIndex::new(10)));
        assert!(!set.contains(StateIndex::new(10)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_union() {
        let mut a = VisitedSet::new(100);
        let mut b = VisitedSet::new(100);
        a.insert(StateIndex::new(1));
        b.insert(StateIndex::new(99));
        b.insert(StateIndex::new(1));
        a.union_with(&b);
        assert_eq!(a.len(), 2);
        assert!(a.contains(StateIndex::new(99)));
    }

    #[test]
    fn test_iter_unvisited() {
        let mut set = VisitedSet::new(5);
        set.insert(StateIndex::new(1));
        set.insert(StateIndex::new(3));
        let rest: Vec<u64> = set.iter_unvisited().map(StateIndex::value).collect();
        assert_eq!(rest, vec![0, 2, 4]);
    }

    #[test]
    fn test_empty_space() {
        let set = VisitedSet::new(0);
        assert!(set.is_empty());
        assert_eq!(set.iter_unvisited().count(), 0);
    }

    #[test]
    fn test_storage_covers_whole_space() {
        // One bit per state, however little of the space gets marked.
        let mut set = VisitedSet::new(1 << 20);
        set.insert(StateIndex::new(5));
        assert_eq!(set.words.len(), (1 << 20) / 64);
    }
}
