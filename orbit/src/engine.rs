//! The enumeration entry point and per-request options.

use core::time::Duration;

use tracing::{info, info_span};

use crate::config::EngineConfig;
use crate::cycle::{Algorithm, Detail};
use crate::error::{ConfigError, EnumerationError};
use crate::merge::AggregateResult;
use crate::scheduler::{log_plan, Scheduler};
use crate::select::{Mode, ModeSelector, Plan};
use crate::space::StateSpace;

/// Knobs for one enumeration request.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use uor_orbit::{Algorithm, Detail, EnumerateOptions, Mode};
///
/// let options = EnumerateOptions::new(4)
///     .mode(Mode::Hybrid)
///     .algorithm(Algorithm::Brent)
///     .detail(Detail::Full)
///     .timeout(Duration::from_secs(10));
/// assert_eq!(options.workers(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateOptions {
    workers: usize,
    mode: Mode,
    algorithm: Algorithm,
    detail: Detail,
    timeout: Option<Duration>,
    batch_size: Option<u64>,
}

impl EnumerateOptions {
    /// Options for `workers` workers with every other knob at its default.
    #[must_use]
    pub const fn new(workers: usize) -> Self {
        Self {
            workers,
            mode: Mode::Auto,
            algorithm: Algorithm::Enumeration,
            detail: Detail::PeriodOnly,
            timeout: None,
            batch_size: None,
        }
    }

    /// Sets the scheduling mode.
    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the detection algorithm.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the detail level.
    #[must_use]
    pub const fn detail(mut self, detail: Detail) -> Self {
        self.detail = detail;
        self
    }

    /// Sets the parallel-phase deadline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the selected batch size.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Requested worker count.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Checks the request before any work starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroWorkers`] or [`ConfigError::ZeroBatchSize`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if matches!(self.batch_size, Some(0)) {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

impl Default for EnumerateOptions {
    /// One worker per available core.
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(workers)
    }
}

/// An enumeration engine bound to a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    selector: ModeSelector,
}

impl Engine {
    /// Creates an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] in `config`.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            selector: ModeSelector::from_config(&config),
            config,
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The plan a request would run with, without running it.
    #[must_use]
    pub fn plan(&self, total: u64, options: &EnumerateOptions) -> Plan {
        self.selector
            .plan(total, options.workers, options.mode, options.batch_size)
    }

    /// Enumerates every cycle of `space`.
    ///
    /// # Errors
    ///
    /// - [`EnumerationError::Configuration`] for an invalid request
    /// - [`EnumerationError::Collaborator`] if the transition function fails
    ///   or is not a permutation
    /// - [`EnumerationError::Invariant`] if the merged census is inconsistent
    /// - [`EnumerationError::WorkerPanicked`], [`EnumerationError::ProducerPanicked`],
    ///   [`EnumerationError::Spawn`] for thread failures
    pub fn enumerate<S: StateSpace>(
        &self,
        space: &S,
        options: &EnumerateOptions,
    ) -> Result<AggregateResult, EnumerationError> {
        options.validate()?;
        let total = space.total_states();
        let plan = self.plan(total, options);
        let span = info_span!("enumerate", n = total, workers = plan.workers, mode = %plan.mode);
        let _entered = span.enter();
        log_plan(total, &plan);

        let scheduler = Scheduler::new(
            total,
            plan,
            options.algorithm,
            options.detail,
            &self.config,
            options.timeout.or_else(|| self.config.timeout()),
        );
        let result = scheduler.run(space)?;
        info!(
            cycles = result.cycle_count(),
            elapsed_ms = result.diagnostics.elapsed.as_millis() as u64,
            imbalance_percent = result.diagnostics.imbalance_percent,
            fallback = result.diagnostics.fallback.is_some(),
            "enumeration complete"
        );
        Ok(result)
    }
}

/// Enumerates every cycle of `space` with the default configuration.
///
/// # Errors
///
/// As [`Engine::enumerate`].
///
/// # Example
///
/// ```
/// use uor_orbit::space::FnSpace;
/// use uor_orbit::{enumerate, EnumerateOptions};
///
/// let space = FnSpace::new(16, |x| (x + 1) % 16);
/// let result = enumerate(&space, &EnumerateOptions::new(4)).unwrap();
/// assert_eq!(result.cycle_count(), 1);
/// assert_eq!(result.total_period_sum, 16);
/// ```
pub fn enumerate<S: StateSpace>(
    space: &S,
    options: &EnumerateOptions,
) -> Result<AggregateResult, EnumerationError> {
    Engine::default().enumerate(space, options)
}
