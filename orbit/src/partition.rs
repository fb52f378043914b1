//! Work partitioning: static per-worker chunks and lazy batch streams.
//!
//! # Example
//!
//! ```
//! use uor_orbit::partition::{batch_stream, static_chunks};
//! use uor_orbit::IndexRange;
//!
//! // 10 states over 3 workers: the remainder goes to the first chunk.
//! let chunks = static_chunks(10, 3);
//! assert_eq!(
//!     chunks,
//!     vec![IndexRange::new(0, 4), IndexRange::new(4, 7), IndexRange::new(7, 10)]
//! );
//!
//! let lens: Vec<u64> = batch_stream(10, 4).map(|b| b.len()).collect();
//! assert_eq!(lens, vec![4, 4, 2]);
//! ```

use alloc::vec::Vec;
use core::fmt;

use crate::index::{IndexRange, IndexRangeIter, StateIndex};

/// Splits `[0, n)` into `workers` contiguous, near-equal ranges.
///
/// The first `n % workers` ranges are one index longer. When `workers > n`
/// the trailing ranges are empty, so every worker still gets exactly one.
#[must_use]
pub fn static_chunks(n: u64, workers: usize) -> Vec<IndexRange> {
    split_range(IndexRange::full(n), workers)
}

/// Splits an arbitrary range into `parts` contiguous, near-equal ranges.
#[must_use]
pub fn split_range(range: IndexRange, parts: usize) -> Vec<IndexRange> {
    let parts = parts.max(1) as u64;
    let base = range.len() / parts;
    let remainder = range.len() % parts;
    let mut start = range.start().value();
    (0..parts)
        .map(|i| {
            let len = base + u64::from(i < remainder);
            let chunk = IndexRange::with_len(start, len);
            start += len;
            chunk
        })
        .collect()
}

/// A unit of distributable work: a contiguous run of start candidates.
///
/// Each entry is a candidate start index; whether it is still unvisited is
/// decided by the consuming worker against its own tracker. A batch is
/// consumed exactly once by exactly one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    id: u64,
    range: IndexRange,
}

impl Batch {
    /// Creates batch `id` covering `range`.
    #[must_use]
    pub const fn new(id: u64, range: IndexRange) -> Self {
        Self { id, range }
    }

    /// Sequence number within its stream.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Covered indices.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> IndexRange {
        self.range
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.range.len()
    }

    /// Returns true if the batch has no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Iterates the entries in ascending index order.
    #[inline]
    pub fn iter(&self) -> IndexRangeIter {
        self.range.iter()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{} {}", self.id, self.range)
    }
}

impl IntoIterator for Batch {
    type Item = StateIndex;
    type IntoIter = IndexRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.range.iter()
    }
}

/// Lazy stream of batches over a range.
///
/// Batches are produced on demand; the stream holds only a cursor. It is not
/// resumable: restarting means building a new stream.
#[derive(Clone, Debug)]
pub struct BatchStream {
    rest: IndexRange,
    batch_size: u64,
    next_id: u64,
}

impl BatchStream {
    /// Streams `range` in batches of at most `batch_size` entries.
    ///
    /// A zero batch size is treated as one; callers validate sizes up front.
    #[must_use]
    pub fn new(range: IndexRange, batch_size: u64) -> Self {
        Self {
            rest: range,
            batch_size: batch_size.max(1),
            next_id: 0,
        }
    }

    /// Indices not yet handed out.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.rest.len()
    }
}

impl Iterator for BatchStream {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.rest.is_empty() {
            return None;
        }
        let (head, tail) = self.rest.split_at(self.batch_size);
        self.rest = tail;
        let batch = Batch::new(self.next_id, head);
        self.next_id += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.rest.len().div_ceil(self.batch_size);
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        (count, Some(count))
    }
}

/// Streams the whole space `[0, n)` in batches of `batch_size`.
#[must_use]
pub fn batch_stream(n: u64, batch_size: u64) -> BatchStream {
    BatchStream::new(IndexRange::full(n), batch_size)
}
