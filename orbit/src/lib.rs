//! UOR Orbit - parallel cycle census for finite state spaces
//!
//! Given a permutation of `[0, N)`, Orbit finds every cycle, its length
//! (period), and its canonical key (the smallest member index). The work is
//! spread over worker threads, yet every state is accounted for exactly once
//! and every cycle is reported exactly once.
//!
//! # Pipeline
//!
//! ```text
//! ModeSelector ──▶ Partitioner / Scheduler ──▶ Workers ──▶ CycleDetector
//!                                                 │
//!                                                 ▼
//!                   AggregateResult ◀── Merger ◀── CycleRegistry (claim)
//! ```
//!
//! # Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Σ period == N | checked by the merger; a mismatch aborts the call |
//! | one report per cycle | first-writer-wins [`registry::CycleRegistry`] |
//! | deterministic census | canonical key = minimum over the *whole* cycle |
//! | bounded memory | bounded, backpressured batch queues |
//! | no hangs | deadline, cancellation, sequential fallback |
//!
//! Workers may walk the same cycle more than once; only one of them owns
//! the result.
//!
//! # Example
//!
//! ```
//! use uor_orbit::prelude::*;
//!
//! // {0, 1} is a 2-cycle, {2..7} a 6-cycle.
//! let space = FnSpace::new(8, |x| match x {
//!     0 => 1,
//!     1 => 0,
//!     7 => 2,
//!     x => x + 1,
//! });
//! let options = EnumerateOptions::new(4).mode(Mode::Static).detail(Detail::Full);
//! let result = enumerate(&space, &options).unwrap();
//!
//! assert_eq!(result.periods(), vec![2, 6]);
//! assert_eq!(result.total_period_sum, 8);
//! assert_eq!(result.canonical_key_of(StateIndex::new(5)), Some(StateIndex::new(2)));
//! ```
//!
//! # Logging
//!
//! Orbit emits [`tracing`] events and never installs a subscriber. A timeout
//! is a `WARN` event, not an error: the census is completed sequentially and
//! recorded in [`merge::Diagnostics::fallback`].

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

extern crate alloc;

// Dense indices and ranges
mod index;

// Engine entry point and request options
mod engine;

// Error taxonomy
pub mod error;

// Engine configuration (TOML)
pub mod config;

// Index codec for structured states
pub mod codec;

// State space boundary and closure adapters
pub mod space;

// Worker-local visited tracker
pub mod visited;

// Cycles, algorithms, detail levels
pub mod cycle;

// Cycle detection from one start state
pub mod detector;

// Static chunks and batch streams
pub mod partition;

// First-writer-wins cycle ownership
pub mod registry;

// Merging, invariant checks, diagnostics
pub mod merge;

// Mode selection
pub mod select;

// Worker pool and scheduling modes
pub mod scheduler;

// Re-export core types at crate root
pub use config::EngineConfig;
pub use cycle::{Algorithm, Cycle, Detail};
pub use engine::{enumerate, Engine, EnumerateOptions};
pub use error::{CodecError, ConfigError, EnumerationError, InvariantViolation, TransitionError};
pub use index::{IndexRange, IndexRangeIter, StateIndex};
pub use merge::{AggregateResult, Diagnostics};
pub use scheduler::WorkerId;
pub use select::{ExecutionMode, Mode};

/// Prelude module for convenient imports.
///
/// ```
/// use uor_orbit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::codec::{IndexCodec, MixedRadixCodec};
    pub use crate::cycle::{Algorithm, Cycle, Detail};
    pub use crate::engine::{enumerate, Engine, EnumerateOptions};
    pub use crate::error::EnumerationError;
    pub use crate::index::{IndexRange, StateIndex};
    pub use crate::merge::AggregateResult;
    pub use crate::select::Mode;
    pub use crate::space::{CodecSpace, Evaluator, FnSpace, StateSpace, TryFnSpace};
}
