//! Mode selection: how a request will be scheduled.
//!
//! A pure function of `(N, worker_count)` against the configured
//! [`Thresholds`]:
//!
//! | Size band | Mode |
//! |-----------|------|
//! | `N <= sequential_max`, or one worker | Sequential |
//! | `N <= static_max` | Static |
//! | `N <= hybrid_max` | Hybrid |
//! | larger | Dynamic |

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{BatchConfig, EngineConfig, Thresholds};
use crate::cycle::UnknownVariant;

/// Requested scheduling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Let the selector decide from the problem size.
    #[default]
    Auto,
    /// Single thread, no queues.
    Sequential,
    /// One contiguous chunk per worker.
    Static,
    /// Shared bounded queue fed by a producer.
    Dynamic,
    /// Static chunks first, then stealing from per-worker queues.
    Hybrid,
}

impl Mode {
    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Sequential => "sequential",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "sequential" => Ok(Self::Sequential),
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(UnknownVariant(other.into())),
        }
    }
}

/// A mode after `Auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Runs on the calling thread.
    Sequential,
    /// Per-worker contiguous chunks.
    Static,
    /// Shared bounded batch queue.
    Dynamic,
    /// Static chunks plus work stealing.
    Hybrid,
}

impl ExecutionMode {
    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved execution plan for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Resolved mode.
    pub mode: ExecutionMode,
    /// Parallel workers; 1 for sequential.
    pub workers: usize,
    /// Entries per batch.
    pub batch_size: u64,
}

/// Picks a mode and batch size from the problem size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelector {
    thresholds: Thresholds,
    batch: BatchConfig,
}

impl ModeSelector {
    /// Creates a selector from explicit thresholds and batch sizing.
    #[must_use]
    pub const fn new(thresholds: Thresholds, batch: BatchConfig) -> Self {
        Self { thresholds, batch }
    }

    /// Creates a selector from an engine configuration.
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.thresholds, config.batch)
    }

    /// Mode for `n` states on `workers` workers.
    #[must_use]
    pub const fn select(&self, n: u64, workers: usize) -> ExecutionMode {
        let t = &self.thresholds;
        if workers <= 1 || n <= t.sequential_max {
            ExecutionMode::Sequential
        } else if n <= t.static_max {
            ExecutionMode::Static
        } else if n <= t.hybrid_max {
            ExecutionMode::Hybrid
        } else {
            ExecutionMode::Dynamic
        }
    }

    /// Batch size targeting `per_worker` batches per worker, clamped to the
    /// configured bounds.
    #[must_use]
    pub fn batch_size(&self, n: u64, workers: usize) -> u64 {
        let target = (workers.max(1) as u64).saturating_mul(self.batch.per_worker.max(1));
        (n / target)
            .clamp(self.batch.min_size, self.batch.max_size)
            .max(1)
    }

    /// Resolves a request into a plan.
    ///
    /// An explicit mode is honoured as given; `Auto` goes through
    /// [`ModeSelector::select`]. `batch_size` overrides the computed size.
    #[must_use]
    pub fn plan(&self, n: u64, workers: usize, requested: Mode, batch_size: Option<u64>) -> Plan {
        let mode = match requested {
            Mode::Auto => self.select(n, workers),
            Mode::Sequential => ExecutionMode::Sequential,
            Mode::Static => ExecutionMode::Static,
            Mode::Dynamic => ExecutionMode::Dynamic,
            Mode::Hybrid => ExecutionMode::Hybrid,
        };
        let workers = match mode {
            ExecutionMode::Sequential => 1,
            _ => workers.max(1),
        };
        Plan {
            mode,
            workers,
            batch_size: batch_size.unwrap_or_else(|| self.batch_size(n, workers)),
        }
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        let selector = ModeSelector::default();
        assert_eq!(selector.select(16, 4), ExecutionMode::Sequential);
        assert_eq!(selector.select(4_096, 8), ExecutionMode::Sequential);
        assert_eq!(selector.select(4_097, 8), ExecutionMode::Static);
        assert_eq!(selector.select(262_144, 8), ExecutionMode::Static);
        assert_eq!(selector.select(262_145, 8), ExecutionMode::Hybrid);
        assert_eq!(selector.select(16_777_217, 8), ExecutionMode::Dynamic);
    }

    #[test]
    fn test_single_worker_is_sequential() {
        let selector = ModeSelector::default();
        assert_eq!(selector.select(1 << 30, 1), ExecutionMode::Sequential);
    }

    #[test]
    fn test_thresholds_are_configuration() {
        let thresholds = Thresholds {
            sequential_max: 0,
            static_max: 10,
            hybrid_max: 100,
        };
        let selector = ModeSelector::new(thresholds, BatchConfig::default());
        assert_eq!(selector.select(5, 2), ExecutionMode::Static);
        assert_eq!(selector.select(50, 2), ExecutionMode::Hybrid);
        assert_eq!(selector.select(500, 2), ExecutionMode::Dynamic);
    }

    #[test]
    fn test_batch_size_clamped() {
        let selector = ModeSelector::default();
        assert_eq!(selector.batch_size(100, 4), 64);
        assert_eq!(selector.batch_size(1 << 20, 4), (1 << 20) / 64);
        assert_eq!(selector.batch_size(u64::MAX, 2), 65_536);
    }

    #[test]
    fn test_plan_explicit_mode_and_override() {
        let selector = ModeSelector::default();
        let plan = selector.plan(16, 4, Mode::Dynamic, Some(3));
        assert_eq!(plan.mode, ExecutionMode::Dynamic);
        assert_eq!(plan.workers, 4);
        assert_eq!(plan.batch_size, 3);

        let plan = selector.plan(16, 4, Mode::Sequential, None);
        assert_eq!(plan.workers, 1);
    }

    #[test]
    fn test_mode_names() {
        for mode in [Mode::Auto, Mode::Sequential, Mode::Static, Mode::Dynamic, Mode::Hybrid] {
            assert_eq!(mode.name().parse::<Mode>().unwrap(), mode);
        }
        assert!("stealing".parse::<Mode>().is_err());
    }
}
