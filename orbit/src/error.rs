//! Error taxonomy for cycle enumeration.
//!
//! | Class | Type | Handling |
//! |-------|------|----------|
//! | Configuration | [`ConfigError`] | fatal, surfaced before any work starts |
//! | Collaborator | [`TransitionError`], [`CodecError`] | fatal, propagated unchanged |
//! | Invariant | [`InvariantViolation`] | fatal, never a partial answer |
//!
//! A parallel-phase timeout is not an error: the scheduler completes the
//! census sequentially and records the event in the diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::index::StateIndex;
use crate::scheduler::WorkerId;

/// Boxed source error reported by an external transition function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid engine configuration or request parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A request asked for zero workers.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// A batch size of zero was configured or requested.
    #[error("batch size must be positive")]
    ZeroBatchSize,

    /// The configured batch size bounds are inverted.
    #[error("batch.min_size ({min}) exceeds batch.max_size ({max})")]
    BatchBounds {
        /// Configured lower bound.
        min: u64,
        /// Configured upper bound.
        max: u64,
    },

    /// Bounded queues need room for at least one message.
    #[error("queue.depth must be at least 1")]
    ZeroQueueDepth,

    /// A queue message must carry at least one batch.
    #[error("queue.aggregation must be at least 1")]
    ZeroAggregation,

    /// Blocked queue operations need a positive wake-up interval.
    #[error("queue.poll_interval_ms must be at least 1")]
    ZeroPollInterval,

    /// The hybrid static share must be a fraction.
    #[error("hybrid.static_fraction must lie in [0, 1], got {0}")]
    StaticFraction(f64),

    /// Mode thresholds must be non-decreasing.
    #[error(
        "mode thresholds must satisfy sequential_max <= static_max <= hybrid_max \
         (got {sequential_max}, {static_max}, {hybrid_max})"
    )]
    Thresholds {
        /// Upper bound of the sequential band.
        sequential_max: u64,
        /// Upper bound of the static band.
        static_max: u64,
        /// Upper bound of the hybrid band.
        hybrid_max: u64,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for [`crate::EngineConfig`].
    #[error("invalid configuration TOML")]
    Parse(#[from] toml::de::Error),
}

/// Failure of the external transition collaborator.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The transition function reported its own failure.
    #[error("transition failed at state {index}: {message}")]
    Failed {
        /// State whose successor could not be computed.
        index: StateIndex,
        /// Collaborator-supplied description.
        message: String,
        /// Collaborator-supplied cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The successor of a state lies outside `[0, N)`.
    #[error("successor {successor} of state {index} lies outside [0, {total})")]
    OutOfRange {
        /// State that was advanced.
        index: StateIndex,
        /// Offending successor.
        successor: u64,
        /// Size of the state space.
        total: u64,
    },

    /// The transition is not a permutation: the start state has a tail.
    #[error("state {start} is not on a cycle (walk did not return within {steps} steps)")]
    NotAPermutation {
        /// Start state of the failed walk.
        start: StateIndex,
        /// Steps taken before giving up.
        steps: u64,
    },

    /// Index codec failure while evaluating a codec-backed state space.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransitionError {
    /// Builds a collaborator failure with a message and no source.
    pub fn failed(index: StateIndex, message: impl Into<String>) -> Self {
        Self::Failed {
            index,
            message: message.into(),
            source: None,
        }
    }

    /// Builds a collaborator failure wrapping an underlying error.
    pub fn with_source(
        index: StateIndex,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Failed {
            index,
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Failure of the mixed-radix index codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A position was declared with radix zero.
    #[error("radix at position {position} is zero")]
    ZeroRadix {
        /// Offending position.
        position: usize,
    },

    /// The product of all radices does not fit in a `u64`.
    #[error("state count overflows u64")]
    Overflow,

    /// A value has the wrong number of positions.
    #[error("value has width {actual}, codec expects {expected}")]
    Width {
        /// Codec width.
        expected: usize,
        /// Supplied width.
        actual: usize,
    },

    /// A digit is not below its position's radix.
    #[error("digit {digit} at position {position} is not below radix {radix}")]
    Digit {
        /// Offending position.
        position: usize,
        /// Supplied digit.
        digit: u32,
        /// Radix of the position.
        radix: u32,
    },

    /// An index is outside the codec's state count.
    #[error("index {index} lies outside [0, {total})")]
    IndexOutOfRange {
        /// Offending index.
        index: StateIndex,
        /// Codec state count.
        total: u64,
    },
}

/// A broken accounting invariant in the merged result.
///
/// These indicate a deduplication defect, never a transient condition, so the
/// enumeration aborts rather than return a wrong census.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The periods of all distinct cycles do not sum to the state count.
    #[error("period sum {sum} does not equal state count {total}")]
    PeriodSum {
        /// Sum over distinct canonical keys.
        sum: u64,
        /// Size of the state space.
        total: u64,
    },

    /// The period sum overflowed `u64`.
    #[error("period sum overflows u64 (state count {total})")]
    PeriodSumOverflow {
        /// Size of the state space.
        total: u64,
    },

    /// Two workers reported the same cycle with different periods.
    #[error(
        "cycle {key} reported with period {kept} by {kept_by} and period {other} by {other_by}"
    )]
    ConflictingPeriods {
        /// Canonical key of the cycle.
        key: StateIndex,
        /// Period from the lowest worker id.
        kept: u64,
        /// Worker whose entry was kept.
        kept_by: WorkerId,
        /// Conflicting period.
        other: u64,
        /// Worker that reported the conflicting period.
        other_by: WorkerId,
    },
}

/// Errors returned by [`crate::enumerate`].
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// Invalid configuration or request.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The transition collaborator failed; the cause is propagated unchanged.
    #[error(transparent)]
    Collaborator(#[from] TransitionError),

    /// The merged census broke an accounting invariant.
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// A worker thread panicked.
    #[error("{worker} panicked")]
    WorkerPanicked {
        /// The worker that panicked.
        worker: WorkerId,
    },

    /// The batch producer thread panicked.
    #[error("batch producer panicked")]
    ProducerPanicked,

    /// The operating system refused to start a thread.
    #[error("failed to spawn thread {name}")]
    Spawn {
        /// Name of the thread that could not be started.
        name: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl From<CodecError> for EnumerationError {
    fn from(err: CodecError) -> Self {
        Self::Collaborator(TransitionError::Codec(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError::OutOfRange {
            index: StateIndex::new(3),
            successor: 99,
            total: 16,
        };
        assert_eq!(
            err.to_string(),
            "successor 99 of state 3 lies outside [0, 16)"
        );
    }

    #[test]
    fn test_with_source_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "field table missing");
        let err = TransitionError::with_source(StateIndex::new(5), "lookup failed", io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("field table missing"));
    }

    #[test]
    fn test_collaborator_is_transparent() {
        let err: EnumerationError = TransitionError::failed(StateIndex::new(1), "boom").into();
        assert_eq!(err.to_string(), "transition failed at state 1: boom");
        assert!(matches!(err, EnumerationError::Collaborator(_)));
    }

    #[test]
    fn test_codec_error_converts_to_collaborator() {
        let err: EnumerationError = CodecError::Overflow.into();
        assert!(matches!(
            err,
            EnumerationError::Collaborator(TransitionError::Codec(CodecError::Overflow))
        ));
    }
}
