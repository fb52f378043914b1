//! State spaces: the boundary to the external transition collaborator.
//!
//! The engine only needs two things from a state space: its size `N` and a
//! successor rule `StateIndex → StateIndex`. The rule is evaluated through an
//! [`Evaluator`], and every worker builds its own evaluator, so collaborators
//! that need scratch buffers or cached tables never share mutable context
//! across threads.
//!
//! Adapters cover the common shapes:
//!
//! - [`FnSpace`]: an infallible closure over `u64`
//! - [`TryFnSpace`]: a fallible closure over [`StateIndex`]
//! - [`CodecSpace`]: a rule over digit vectors, bridged with a [`MixedRadixCodec`]

use alloc::vec;
use alloc::vec::Vec;

use crate::codec::{IndexCodec, MixedRadixCodec};
use crate::error::TransitionError;
use crate::index::StateIndex;

/// A finite state space with a deterministic successor rule.
///
/// Implementations must be pure: the successor of an index never depends on
/// which evaluator computed it or in what order indices were visited.
pub trait StateSpace: Sync {
    /// Per-worker evaluation context.
    type Evaluator<'a>: Evaluator
    where
        Self: 'a;

    /// Number of states, `N`.
    fn total_states(&self) -> u64;

    /// Builds a private evaluation context for one worker.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the collaborator cannot set up a context.
    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError>;
}

/// Successor rule bound to one worker's private context.
pub trait Evaluator {
    /// Returns the successor of `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the collaborator fails.
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError>;
}

// =============================================================================
// Closure adapters
// =============================================================================

/// State space defined by an infallible closure over raw indices.
///
/// # Example
///
/// ```
/// use uor_orbit::space::{Evaluator, FnSpace, StateSpace};
/// use uor_orbit::StateIndex;
///
/// let rotate = FnSpace::new(16, |x| (x + 1) % 16);
/// let mut eval = rotate.evaluator().unwrap();
/// assert_eq!(eval.apply(StateIndex::new(15)).unwrap(), StateIndex::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct FnSpace<F> {
    total: u64,
    step: F,
}

impl<F> FnSpace<F>
where
    F: Fn(u64) -> u64 + Sync,
{
    /// Wraps `step` as the successor rule of a space with `total` states.
    pub const fn new(total: u64, step: F) -> Self {
        Self { total, step }
    }
}

/// Evaluator borrowed from a [`FnSpace`].
#[derive(Debug)]
pub struct FnEvaluator<'a, F> {
    step: &'a F,
}

impl<F> Evaluator for FnEvaluator<'_, F>
where
    F: Fn(u64) -> u64,
{
    #[inline]
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        Ok(StateIndex::new((self.step)(index.value())))
    }
}

impl<F> StateSpace for FnSpace<F>
where
    F: Fn(u64) -> u64 + Sync,
{
    type Evaluator<'a>
        = FnEvaluator<'a, F>
    where
        Self: 'a;

    #[inline]
    fn total_states(&self) -> u64 {
        self.total
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Ok(FnEvaluator { step: &self.step })
    }
}

/// State space defined by a fallible closure.
#[derive(Debug, Clone)]
pub struct TryFnSpace<F> {
    total: u64,
    step: F,
}

impl<F> TryFnSpace<F>
where
    F: Fn(StateIndex) -> Result<StateIndex, TransitionError> + Sync,
{
    /// Wraps `step` as the successor rule of a space with `total` states.
    pub const fn new(total: u64, step: F) -> Self {
        Self { total, step }
    }
}

/// Evaluator borrowed from a [`TryFnSpace`].
#[derive(Debug)]
pub struct TryFnEvaluator<'a, F> {
    step: &'a F,
}

impl<F> Evaluator for TryFnEvaluator<'_, F>
where
    F: Fn(StateIndex) -> Result<StateIndex, TransitionError>,
{
    #[inline]
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        (self.step)(index)
    }
}

impl<F> StateSpace for TryFnSpace<F>
where
    F: Fn(StateIndex) -> Result<StateIndex, TransitionError> + Sync,
{
    type Evaluator<'a>
        = TryFnEvaluator<'a, F>
    where
        Self: 'a;

    #[inline]
    fn total_states(&self) -> u64 {
        self.total
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        Ok(TryFnEvaluator { step: &self.step })
    }
}

// =============================================================================
// Codec-backed space
// =============================================================================

/// State space whose rule acts on mixed-radix digit vectors.
///
/// The rule receives the decoded current state and writes the successor into
/// the output slice. Both buffers belong to the evaluator, so each worker
/// decodes into its own scratch space.
///
/// # Example
///
/// ```
/// use uor_orbit::codec::MixedRadixCodec;
/// use uor_orbit::space::{CodecSpace, Evaluator, StateSpace};
/// use uor_orbit::StateIndex;
///
/// // Cyclic shift of a length-3 word over {0, 1}.
/// let codec = MixedRadixCodec::uniform(2, 3).unwrap();
/// let shift = CodecSpace::new(codec, |cur: &[u32], next: &mut [u32]| {
///     next[0] = cur[2];
///     next[1] = cur[0];
///     next[2] = cur[1];
/// });
/// let mut eval = shift.evaluator().unwrap();
/// assert_eq!(eval.apply(StateIndex::new(1)).unwrap(), StateIndex::new(2));
/// ```
#[derive(Debug, Clone)]
pub struct CodecSpace<F> {
    codec: MixedRadixCodec,
    rule: F,
}

impl<F> CodecSpace<F>
where
    F: Fn(&[u32], &mut [u32]) + Sync,
{
    /// Binds a digit-level rule to a codec.
    pub const fn new(codec: MixedRadixCodec, rule: F) -> Self {
        Self { codec, rule }
    }

    /// The codec defining the index layout.
    #[must_use]
    pub const fn codec(&self) -> &MixedRadixCodec {
        &self.codec
    }
}

/// Evaluator for a [`CodecSpace`] with private decode/encode buffers.
#[derive(Debug)]
pub struct CodecEvaluator<'a, F> {
    codec: &'a MixedRadixCodec,
    rule: &'a F,
    current: Vec<u32>,
    next: Vec<u32>,
}

impl<F> Evaluator for CodecEvaluator<'_, F>
where
    F: Fn(&[u32], &mut [u32]),
{
    fn apply(&mut self, index: StateIndex) -> Result<StateIndex, TransitionError> {
        self.codec.decode_into(index, &mut self.current)?;
        (self.rule)(&self.current, &mut self.next);
        Ok(self.codec.encode_digits(&self.next)?)
    }
}

impl<F> StateSpace for CodecSpace<F>
where
    F: Fn(&[u32], &mut [u32]) + Sync,
{
    type Evaluator<'a>
        = CodecEvaluator<'a, F>
    where
        Self: 'a;

    #[inline]
    fn total_states(&self) -> u64 {
        self.codec.state_count()
    }

    fn evaluator(&self) -> Result<Self::Evaluator<'_>, TransitionError> {
        let width = self.codec.width();
        Ok(CodecEvaluator {
            codec: &self.codec,
            rule: &self.rule,
            current: vec![0; width],
            next: vec![0; width],
        })
    }
}
