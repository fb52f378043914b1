//! Cycles of a permutation and the knobs that control how they are found.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::index::StateIndex;

/// A maximal orbit of the transition function.
///
/// Identity is the canonical key alone: two cycles are equal iff their
/// minimum member indices are equal. Immutable once built.
///
/// # Invariants
///
/// - `canonical_key` is the minimum over *all* members
/// - `period >= 1`
/// - if present, `members.len() == period` and `members[0] == canonical_key`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cycle {
    canonical_key: StateIndex,
    period: u64,
    members: Option<Vec<StateIndex>>,
}

impl Cycle {
    /// A cycle known only by key and period.
    #[must_use]
    pub const fn new(canonical_key: StateIndex, period: u64) -> Self {
        Self {
            canonical_key,
            period,
            members: None,
        }
    }

    /// A cycle with its ordered member list.
    ///
    /// `members` may start anywhere on the cycle; it is rotated so that the
    /// canonical key comes first, keeping traversal order. The key and period
    /// are derived from the list.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_members(mut members: Vec<StateIndex>) -> Option<Self> {
        let (offset, &key) = members
            .iter()
            .enumerate()
            .min_by_key(|&(_, index)| *index)?;
        members.rotate_left(offset);
        Some(Self {
            canonical_key: key,
            period: members.len() as u64,
            members: Some(members),
        })
    }

    /// Minimum member index; the deduplication key.
    #[inline]
    #[must_use]
    pub const fn canonical_key(&self) -> StateIndex {
        self.canonical_key
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub const fn period(&self) -> u64 {
        self.period
    }

    /// Ordered members starting at the canonical key, when collected.
    #[inline]
    #[must_use]
    pub fn members(&self) -> Option<&[StateIndex]> {
        self.members.as_deref()
    }

    /// Returns true for a fixed point (`period == 1`).
    #[inline]
    #[must_use]
    pub const fn is_fixed_point(&self) -> bool {
        self.period == 1
    }

    /// Consumes the cycle, returning its member list if collected.
    #[must_use]
    pub fn into_members(self) -> Option<Vec<StateIndex>> {
        self.members
    }
}

impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key == other.canonical_key
    }
}

impl Eq for Cycle {}

impl Hash for Cycle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key.hash(state);
    }
}

impl PartialOrd for Cycle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cycle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_key.cmp(&other.canonical_key)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle@{} (period {})", self.canonical_key, self.period)
    }
}

/// Cycle-detection algorithm.
///
/// | Algorithm | Extra space | Transition calls per cycle |
/// |-----------|-------------|----------------------------|
/// | Enumeration | O(1), O(period) for `Full` | `period` |
/// | Floyd | O(1) | ≈ 3–4 × `period` |
/// | Brent | O(1) | ≈ 3 × `period` |
///
/// Floyd and Brent still finish with one full canonicalization walk, so the
/// key is always the minimum over the whole cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Walk from the start until it recurs.
    #[default]
    Enumeration,
    /// Tortoise and hare.
    Floyd,
    /// Power-of-two teleporting tortoise.
    Brent,
}

impl Algorithm {
    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enumeration => "enumeration",
            Self::Floyd => "floyd",
            Self::Brent => "brent",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enumeration" => Ok(Self::Enumeration),
            "floyd" => Ok(Self::Floyd),
            "brent" => Ok(Self::Brent),
            other => Err(UnknownVariant(other.into())),
        }
    }
}

/// How much of each cycle to retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detail {
    /// Key and period only; constant memory per walk.
    #[default]
    PeriodOnly,
    /// Key, period, and the ordered member list.
    Full,
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodOnly => f.write_str("period-only"),
            Self::Full => f.write_str("full"),
        }
    }
}

impl FromStr for Detail {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "period-only" => Ok(Self::PeriodOnly),
            "full" => Ok(Self::Full),
            other => Err(UnknownVariant(other.into())),
        }
    }
}

/// A name that does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub alloc::string::String);

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(values: &[u64]) -> Vec<StateIndex> {
        values.iter().copied().map(StateIndex::new).collect()
    }

    #[test]
    fn test_from_members_rotates_to_key() {
        let cycle = Cycle::from_members(idx(&[7, 3, 9, 5])).unwrap();
        assert_eq!(cycle.canonical_key(), StateIndex::new(3));
        assert_eq!(cycle.period(), 4);
        assert_eq!(cycle.members().unwrap(), idx(&[3, 9, 5, 7]).as_slice());
    }

    #[test]
    fn test_from_members_empty() {
        assert!(Cycle::from_members(Vec::new()).is_none());
    }

    #[test]
    fn test_equality_by_key() {
        let a = Cycle::new(StateIndex::new(2), 6);
        let b = Cycle::from_members(idx(&[4, 2, 3, 5, 6, 7])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Cycle::new(StateIndex::new(0), 6));
    }

    #[test]
    fn test_fixed_point() {
        let cycle = Cycle::from_members(idx(&[0])).unwrap();
        assert!(cycle.is_fixed_point());
    }

    #[test]
    fn test_names_roundtrip() {
        for algo in [Algorithm::Enumeration, Algorithm::Floyd, Algorithm::Brent] {
            assert_eq!(algo.to_string().parse::<Algorithm>().unwrap(), algo);
        }
        for detail in [Detail::PeriodOnly, Detail::Full] {
            assert_eq!(detail.to_string().parse::<Detail>().unwrap(), detail);
        }
        assert!("rho".parse::<Algorithm>().is_err());
    }
}
