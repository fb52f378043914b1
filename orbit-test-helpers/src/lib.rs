//! Test-only fixtures for `uor-orbit`.
//!
//! State spaces with known cycle structure, misbehaving collaborators, and a
//! naive single-threaded census used as the oracle in integration tests and
//! benches. Not published.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;
use uor_orbit::space::{Evaluator, FnSpace, StateSpace};
use uor_orbit::{StateIndex, TransitionError};

// =============================================================================
// Well-behaved spaces
// =============================================================================

/// `x → (x + 1) mod n`: a single cycle of period `n`.
pub fn rotation(n: u64) -> FnSpace<impl Fn(u64) -> u64 + Sync + Send + Clone> {
    FnSpace::new(n, move |x| if x + 1 == n { 0 } else { x + 1 })
}

/// `N = 8`: `{0, 1}` is a 2-cycle and `{2..7}` a 6-cycle.
pub fn scenario_b() -> FnSpace<impl Fn(u64) -> u64 + Sync + Send + Clone> {
    FnSpace::new(8, |x| match x {
        0 => 1,
        1 => 0,
        7 => 2,
        x => x + 1,
    })
}

/// `x → (a·x + b) mod n`.
///
/// # Panics
///
/// Panics unless `gcd(a, n) == 1`, which is what makes the map a permutation.
pub fn affine(n: u64, a: u64, b: u64) -> FnSpace<impl Fn(u64) -> u64 + Sync + Send + Clone> {
    assert!(n > 0 && gcd(a % n, n) == 1, "x -> {a}x + {b} is not a permutation of [0, {n})");
    let (a, b, m) = (u128::from(a), u128::from(b), u128::from(n));
    FnSpace::new(n, move |x| ((a * u128::from(x) + b) % m) as u64)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A permutation stored as an explicit successor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpace {
    next: Vec<u64>,
}

impl TableSpace {
    /// Wraps an explicit successor table.
    pub fn new(next: Vec<u64>) -> Self {
        Self { next }
    }

    /// Uniformly random permutation of `[0, n)`, reproducible from `seed`.
    pub fn random(n: u64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut next: Vec<u64> = (0..n).collect();
        next.shuffle(&mut rng);
        Self { next }
    }

    /// Random permutation built from cycles of the given lengths, with members
    /// scattered over the index range.
    pub fn with_cycle_lengths(lengths: &[u64], seed: u64) -> Self {
        let n: u64 = lengths.iter().sum();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<u64> = (0..n).collect();
        order.shuffle(&mut rng);
        let mut next = vec![0; order.len()];
        let mut offset = 0usize;
        for &len in lengths {
            let members = &order[offset..offset + len as usize];
            for (i, &member) in members.iter().enumerate() {
                next[member as usize] = members[(i + 1) % members.len()];
            }
            offset += len as usize;
        }
        Self { next }
    }

    /// The successor table.
    pub fn table(&self) -> &[u64] {
        &self.next
    }
}

/// Evaluator over a [`TableSpace`].
#[derive(Debug)]
pub struct TableEvaluator<'a> {
    next: &'a [u64],
}

impl Evaluator for TableEvaluator<'_> {
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        self.next
            .get(index.as_usize())
            .map(|&n| StateIndex::new(n))
            .ok_or_else(|| TransitionError::failed(index, "index outside table"))
    }
}

impl StateSpace for TableSpace {
    type Evaluator<'a> = TableEvaluator<'a>;

    fn total_states(&self) -> u64 {
        self.next.len() as u64
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Ok(TableEvaluator { next: &self.next })
    }
}

// =============================================================================
// Misbehaving spaces
// =============================================================================

/// Wraps a space and sleeps before every transition.
#[derive(Debug, Clone)]
pub struct SlowSpace<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowSpace<S> {
    /// Delays every transition of `inner` by `delay`.
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

/// Evaluator for [`SlowSpace`].
#[derive(Debug)]
pub struct SlowEvaluator<E> {
    inner: E,
    delay: Duration,
}

impl<E: Evaluator> Evaluator for SlowEvaluator<E> {
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        std::thread::sleep(self.delay);
        self.inner.apply(index)
    }
}

impl<S: StateSpace> StateSpace for SlowSpace<S> {
    type Evaluator<'a>
        = SlowEvaluator<S::Evaluator<'a>>
    where
        Self: 'a;

    fn total_states(&self) -> u64 {
        self.inner.total_states()
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Ok(SlowEvaluator {
            inner: self.inner.evaluator()?,
            delay: self.delay,
        })
    }
}

/// Rotation of `[0, n)` whose transition fails at one state.
#[derive(Debug, Clone, Copy)]
pub struct FailingSpace {
    total: u64,
    fail_at: u64,
}

impl FailingSpace {
    /// Fails whenever the successor of `fail_at` is requested.
    pub fn new(total: u64, fail_at: u64) -> Self {
        Self { total, fail_at }
    }
}

/// Evaluator for [`FailingSpace`].
#[derive(Debug)]
pub struct FailingEvaluator {
    space: FailingSpace,
}

impl Evaluator for FailingEvaluator {
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        if index.value() == self.space.fail_at {
            return Err(TransitionError::with_source(
                index,
                "field arithmetic unavailable",
                std::io::Error::new(std::io::ErrorKind::Other, "lookup table missing"),
            ));
        }
        Ok(StateIndex::new((index.value() + 1) % self.space.total))
    }
}

impl StateSpace for FailingSpace {
    type Evaluator<'a> = FailingEvaluator;

    fn total_states(&self) -> u64 {
        self.total
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Ok(FailingEvaluator { space: *self })
    }
}

/// A space whose evaluator cannot be built.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableSpace {
    /// Reported state count.
    pub total: u64,
}

impl StateSpace for UnavailableSpace {
    type Evaluator<'a> = FailingEvaluator;

    fn total_states(&self) -> u64 {
        self.total
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Err(TransitionError::failed(StateIndex::ZERO, "no evaluation context"))
    }
}

/// Every state maps to 0: not a permutation.
pub fn collapsing(n: u64) -> FnSpace<impl Fn(u64) -> u64 + Sync + Send + Clone> {
    FnSpace::new(n, |_| 0)
}

/// The last state maps outside the space.
pub fn escaping(n: u64) -> FnSpace<impl Fn(u64) -> u64 + Sync + Send + Clone> {
    FnSpace::new(n, |x| x + 1)
}

// =============================================================================
// Oracle
// =============================================================================

/// Single-threaded census with a plain `Vec<bool>`: `canonical_key → period`.
///
/// # Panics
///
/// Panics if the space is not a permutation.
pub fn reference_census<S: StateSpace>(space: &S) -> BTreeMap<StateIndex, u64> {
    let n = space.total_states();
    let mut eval = space.evaluator().expect("evaluator");
    let mut seen = vec![false; n as usize];
    let mut census = BTreeMap::new();
    for start in 0..n {
        if seen[start as usize] {
            continue;
        }
        let mut key = start;
        let mut period = 0u64;
        let mut current = start;
        loop {
            assert!(!seen[current as usize], "state {current} reached twice");
            seen[current as usize] = true;
            key = key.min(current);
            period += 1;
            current = eval
                .apply(StateIndex::new(current))
                .expect("transition")
                .value();
            if current == start {
                break;
            }
        }
        census.insert(StateIndex::new(key), period);
    }
    census
}

/// Period multiset of a census, sorted.
pub fn sorted_periods(census: &BTreeMap<StateIndex, u64>) -> Vec<u64> {
    let mut periods: Vec<u64> = census.values().copied().collect();
    periods.sort_unstable();
    periods
}

// =============================================================================
// Tracing
// =============================================================================

/// Installs a test-writer `tracing` subscriber once per test binary.
///
/// Honours `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_censuses() {
        assert_eq!(sorted_periods(&reference_census(&rotation(16))), vec![16]);
        assert_eq!(sorted_periods(&reference_census(&scenario_b())), vec![2, 6]);
        let census = reference_census(&TableSpace::with_cycle_lengths(&[1, 3, 5, 5], 7));
        assert_eq!(sorted_periods(&census), vec![1, 3, 5, 5]);
    }

    #[test]
    fn test_random_is_reproducible() {
        assert_eq!(TableSpace::random(100, 1), TableSpace::random(100, 1));
        assert_eq!(reference_census(&TableSpace::random(100, 1)).values().sum::<u64>(), 100);
    }

    #[test]
    fn test_affine_is_permutation() {
        assert_eq!(reference_census(&affine(1_000, 7, 3)).values().sum::<u64>(), 1_000);
    }
}
