//! Cycle detection from a single start state.
//!
//! Every algorithm ends with one canonicalization walk over the entire cycle,
//! so the canonical key is the minimum over all members, never over a prefix.
//! For [`Algorithm::Enumeration`] that walk *is* the detection walk, which is
//! why it is the default: the key costs nothing extra.
//!
//! The detector also guards the permutation assumption. A start state that
//! does not recur within `N` steps (or that Floyd/Brent find on a tail) is
//! reported as [`TransitionError::NotAPermutation`] instead of looping forever.
//!
//! # Example
//!
//! ```
//! use uor_orbit::detector::CycleDetector;
//! use uor_orbit::space::{FnSpace, StateSpace};
//! use uor_orbit::{Algorithm, Detail, StateIndex};
//!
//! // 0 <-> 1, and 2 -> 3 -> 4 -> 5 -> 6 -> 7 -> 2
//! let space = FnSpace::new(8, |x| match x {
//!     0 => 1,
//!     1 => 0,
//!     7 => 2,
//!     x => x + 1,
//! });
//! let detector = CycleDetector::new(8, Algorithm::Enumeration, Detail::Full);
//! let mut eval = space.evaluator().unwrap();
//!
//! let cycle = detector.detect(&mut eval, StateIndex::new(5)).unwrap();
//! assert_eq!(cycle.canonical_key(), StateIndex::new(2));
//! assert_eq!(cycle.period(), 6);
//! ```

use alloc::vec::Vec;

use crate::cycle::{Algorithm, Cycle, Detail};
use crate::error::TransitionError;
use crate::index::StateIndex;
use crate::space::Evaluator;

/// Result of one detection: the cycle plus the work it took.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The detected cycle.
    pub cycle: Cycle,
    /// Transition function calls spent, canonicalization walk included.
    pub transition_calls: u64,
}

/// Stateless cycle detector for a state space of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDetector {
    total: u64,
    algorithm: Algorithm,
    detail: Detail,
}

impl CycleDetector {
    /// Creates a detector for a space of `total` states.
    #[must_use]
    pub const fn new(total: u64, algorithm: Algorithm, detail: Detail) -> Self {
        Self {
            total,
            algorithm,
            detail,
        }
    }

    /// Size of the state space.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Selected algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Selected detail level.
    #[must_use]
    pub const fn detail(&self) -> Detail {
        self.detail
    }

    /// Detects the cycle through `start`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the collaborator fails, yields an
    /// out-of-range successor, or `start` is not on a cycle.
    pub fn detect<E>(&self, eval: &mut E, start: StateIndex) -> Result<Cycle, TransitionError>
    where
        E: Evaluator + ?Sized,
    {
        self.detect_with(eval, start, |_| {}).map(|d| d.cycle)
    }

    /// Detects the cycle through `start`, calling `visit` once per member
    /// during the canonicalization walk.
    ///
    /// # Errors
    ///
    /// Same as [`CycleDetector::detect`].
    pub fn detect_with<E, V>(
        &self,
        eval: &mut E,
        start: StateIndex,
        visit: V,
    ) -> Result<Detection, TransitionError>
    where
        E: Evaluator + ?Sized,
        V: FnMut(StateIndex),
    {
        let mut stepper = Stepper {
            eval,
            total: self.total,
            calls: 0,
        };
        if !start.is_within(self.total) {
            return Err(TransitionError::OutOfRange {
                index: start,
                successor: start.value(),
                total: self.total,
            });
        }

        let expected = match self.algorithm {
            Algorithm::Enumeration => None,
            Algorithm::Floyd => Some(floyd(&mut stepper, start)?),
            Algorithm::Brent => Some(brent(&mut stepper, start)?),
        };

        let cycle = canonical_walk(&mut stepper, start, self.detail, visit)?;
        debug_assert!(expected.map_or(true, |lambda| lambda == cycle.period()));

        Ok(Detection {
            cycle,
            transition_calls: stepper.calls,
        })
    }

    /// Re-detects `cycle` with another algorithm and checks key and period agree.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the re-detection itself fails.
    pub fn verify<E>(
        &self,
        eval: &mut E,
        cycle: &Cycle,
        against: Algorithm,
    ) -> Result<bool, TransitionError>
    where
        E: Evaluator + ?Sized,
    {
        let other = Self::new(self.total, against, Detail::PeriodOnly);
        let again = other.detect(eval, cycle.canonical_key())?;
        Ok(again.canonical_key() == cycle.canonical_key() && again.period() == cycle.period())
    }
}

/// Range-checked, call-counting wrapper around an evaluator.
struct Stepper<'e, E: ?Sized> {
    eval: &'e mut E,
    total: u64,
    calls: u64,
}

impl<E: Evaluator + ?Sized> Stepper<'_, E> {
    #[inline]
    fn step(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        self.calls += 1;
        let next = self.eval.apply(index)?;
        if next.is_within(self.total) {
            Ok(next)
        } else {
            Err(TransitionError::OutOfRange {
                index,
                successor: next.value(),
                total: self.total,
            })
        }
    }
}

/// Walks the full cycle once: period, running minimum, optional members.
fn canonical_walk<E, V>(
    stepper: &mut Stepper<'_, E>,
    start: StateIndex,
    detail: Detail,
    mut visit: V,
) -> Result<Cycle, TransitionError>
where
    E: Evaluator + ?Sized,
    V: FnMut(StateIndex),
{
    let mut members = match detail {
        Detail::Full => Some(Vec::new()),
        Detail::PeriodOnly => None,
    };
    let mut key = start;
    let mut period: u64 = 0;
    let mut current = start;
    loop {
        visit(current);
        if let Some(list) = members.as_mut() {
            list.push(current);
        }
        key = key.min(current);
        period += 1;
        current = stepper.step(current)?;
        if current == start {
            break;
        }
        if period >= stepper.total {
            return Err(TransitionError::NotAPermutation {
                start,
                steps: period,
            });
        }
    }

    match members {
        Some(list) => Ok(Cycle::from_members(list).unwrap_or(Cycle::new(key, period))),
        None => Ok(Cycle::new(key, period)),
    }
}

/// Floyd's tortoise and hare. Returns the cycle length.
fn floyd<E: Evaluator + ?Sized>(
    stepper: &mut Stepper<'_, E>,
    start: StateIndex,
) -> Result<u64, TransitionError> {
    let mut tortoise = stepper.step(start)?;
    let mut hare = stepper.step(start)?;
    hare = stepper.step(hare)?;
    while tortoise != hare {
        tortoise = stepper.step(tortoise)?;
        hare = stepper.step(hare)?;
        hare = stepper.step(hare)?;
    }

    // Tail length: zero iff start lies on the cycle.
    let mut mu: u64 = 0;
    tortoise = start;
    while tortoise != hare {
        tortoise = stepper.step(tortoise)?;
        hare = stepper.step(hare)?;
        mu += 1;
    }
    if mu != 0 {
        return Err(TransitionError::NotAPermutation { start, steps: mu });
    }

    let mut lambda: u64 = 1;
    hare = stepper.step(tortoise)?;
    while tortoise != hare {
        hare = stepper.step(hare)?;
        lambda += 1;
    }
    Ok(lambda)
}

/// Brent's power-of-two search. Returns the cycle length.
fn brent<E: Evaluator + ?Sized>(
    stepper: &mut Stepper<'_, E>,
    start: StateIndex,
) -> Result<u64, TransitionError> {
    let mut power: u64 = 1;
    let mut lambda: u64 = 1;
    let mut tortoise = start;
    let mut hare = stepper.step(start)?;
    while tortoise != hare {
        if power == lambda {
            tortoise = hare;
            power = power.saturating_mul(2);
            lambda = 0;
        }
        hare = stepper.step(hare)?;
        lambda += 1;
    }

    tortoise = start;
    hare = start;
    for _ in 0..lambda {
        hare = stepper.step(hare)?;
    }
    let mut mu: u64 = 0;
    while tortoise != hare {
        tortoise = stepper.step(tortoise)?;
        hare = stepper.step(hare)?;
        mu += 1;
    }
    if mu != 0 {
        return Err(TransitionError::NotAPermutation { start, steps: mu });
    }
    Ok(lambda)
}
