//! Dense state indices and contiguous index ranges.
//!
//! A [`StateIndex`] names one point of a state space `[0, N)`. The integer
//! order of indices is the canonicalization order: a cycle is keyed by the
//! smallest index among its members.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A point of the state space `[0, N)`.
///
/// Total order is the integer order; this is the order used to pick a
/// cycle's canonical key.
///
/// # Example
///
/// ```
/// use uor_orbit::StateIndex;
///
/// let a = StateIndex::new(3);
/// let b = StateIndex::new(7);
/// assert!(a < b);
/// assert_eq!(a.min(b), a);
/// assert_eq!(b.value(), 7);
/// ```
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct StateIndex(u64);

impl StateIndex {
    /// The first index of every state space.
    pub const ZERO: Self = Self(0);

    /// Creates an index from its integer value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the integer value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the index as `usize` (for bitset addressing).
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns true if the index lies in `[0, n)`.
    #[inline]
    #[must_use]
    pub const fn is_within(self, n: u64) -> bool {
        self.0 < n
    }
}

impl fmt::Debug for StateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateIndex({})", self.0)
    }
}

impl fmt::Display for StateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StateIndex {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u32> for StateIndex {
    #[inline]
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

impl From<StateIndex> for u64 {
    #[inline]
    fn from(index: StateIndex) -> Self {
        index.0
    }
}

/// A half-open range `[start, end)` of consecutive state indices.
///
/// Unlike the toroidal ranges used elsewhere in UOR, index ranges never wrap:
/// a state space has a first and a last index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    start: u64,
    end: u64,
}

impl IndexRange {
    /// The empty range at index 0.
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    /// Creates the range `[start, end)`. An inverted range is clamped to empty.
    #[inline]
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Creates `[start, start + len)`, saturating at `u64::MAX`.
    #[inline]
    #[must_use]
    pub const fn with_len(start: u64, len: u64) -> Self {
        Self {
            start,
            end: start.saturating_add(len),
        }
    }

    /// The whole state space `[0, n)`.
    #[inline]
    #[must_use]
    pub const fn full(n: u64) -> Self {
        Self { start: 0, end: n }
    }

    /// First index in the range.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> StateIndex {
        StateIndex(self.start)
    }

    /// One past the last index in the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> StateIndex {
        StateIndex(self.end)
    }

    /// Number of indices in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the range is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if `index` lies in the range.
    #[inline]
    #[must_use]
    pub const fn contains(&self, index: StateIndex) -> bool {
        index.0 >= self.start && index.0 < self.end
    }

    /// Splits off the first `len` indices, returning `(head, tail)`.
    #[inline]
    #[must_use]
    pub const fn split_at(&self, len: u64) -> (Self, Self) {
        let mid = if len >= self.len() {
            self.end
        } else {
            self.start + len
        };
        (
            Self {
                start: self.start,
                end: mid,
            },
            Self {
                start: mid,
                end: self.end,
            },
        )
    }

    /// Iterates the indices of the range in ascending order.
    #[inline]
    #[must_use]
    pub const fn iter(&self) -> IndexRangeIter {
        IndexRangeIter {
            next: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl IntoIterator for IndexRange {
    type Item = StateIndex;
    type IntoIter = IndexRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &IndexRange {
    type Item = StateIndex;
    type IntoIter = IndexRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over an [`IndexRange`].
#[derive(Clone, Debug)]
pub struct IndexRangeIter {
    next: u64,
    end: u64,
}

impl Iterator for IndexRangeIter {
    type Item = StateIndex;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            None
        } else {
            let index = StateIndex(self.next);
            self.next += 1;
            Some(index)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndexRangeIter {}
