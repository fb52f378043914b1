//! Scheduler and worker pool.
//!
//! # Modes
//!
//! | Mode | Work source per worker | Coordination |
//! |------|------------------------|--------------|
//! | Sequential | whole space, calling thread | none |
//! | Static | one contiguous chunk | registry only |
//! | Dynamic | shared bounded queue, producer thread | queue + registry |
//! | Hybrid | static chunk, then own/peer bounded queues | queues + registry |
//!
//! # Deadline and Fallback
//!
//! Workers report over a completion channel. When the parallel phase
//! outlives its deadline the driver raises the cancellation flag; the
//! producer stops, workers finish their current batch and report. The driver
//! then completes the census on the calling thread, starting from the union
//! of every worker's visited tracker. Claiming through the registry is
//! idempotent, so the sequential pass never double-reports a cycle.

mod producer;
mod steal;
mod worker;

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, QueueConfig};
use crate::cycle::{Algorithm, Detail};
use crate::detector::CycleDetector;
use crate::error::{EnumerationError, TransitionError};
use crate::index::IndexRange;
use crate::merge::{
    self, AggregateResult, Diagnostics, FallbackReport, ProducerReport, WorkerPartialResult,
};
use crate::partition::{split_range, static_chunks, Batch, BatchStream};
use crate::registry::CycleRegistry;
use crate::select::{ExecutionMode, Plan};
use crate::space::StateSpace;
use crate::visited::VisitedSet;

use self::steal::StealQueues;
use self::worker::{Worker, WorkerOutcome};

// =============================================================================
// Worker identity
// =============================================================================

/// Identifier of a worker within one enumeration call.
///
/// Parallel workers are numbered `0..workers`; the sequential fallback pass
/// uses id `workers`, so it sorts after every parallel worker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(usize);

impl WorkerId {
    /// Creates a worker id.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the worker in the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerId({})", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Per-worker work assignment.
enum Assignment<'q> {
    Range(IndexRange),
    Shared(Receiver<Vec<Batch>>),
    Stealing(IndexRange, &'q StealQueues),
}

/// Parallel phase result before merging.
struct ParallelOutcome {
    outcomes: Vec<WorkerOutcome>,
    producer: Option<ProducerReport>,
    timed_out: bool,
}

/// Runs one resolved [`Plan`] against a state space.
#[derive(Debug, Clone)]
pub struct Scheduler {
    plan: Plan,
    detector: CycleDetector,
    queue: QueueConfig,
    static_fraction: f64,
    timeout: Option<Duration>,
}

impl Scheduler {
    /// Creates a scheduler for a space of `total` states.
    #[must_use]
    pub fn new(
        total: u64,
        plan: Plan,
        algorithm: Algorithm,
        detail: Detail,
        config: &EngineConfig,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            plan,
            detector: CycleDetector::new(total, algorithm, detail),
            queue: config.queue,
            static_fraction: config.hybrid.static_fraction,
            timeout,
        }
    }

    /// The plan this scheduler executes.
    #[must_use]
    pub const fn plan(&self) -> Plan {
        self.plan
    }

    /// Enumerates every cycle of `space`.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError::Collaborator`] if the transition function
    /// fails, [`EnumerationError::Invariant`] if the merged census is
    /// inconsistent, and [`EnumerationError::WorkerPanicked`],
    /// [`EnumerationError::ProducerPanicked`] or [`EnumerationError::Spawn`]
    /// for thread failures.
    pub fn run<S: StateSpace>(&self, space: &S) -> Result<AggregateResult, EnumerationError> {
        let started = Instant::now();
        let total = self.detector.total();
        let registry = CycleRegistry::new();

        let (partials, producer, fallback) = match self.plan.mode {
            ExecutionMode::Sequential => {
                let mut worker = Worker::new(
                    WorkerId::new(0),
                    space.evaluator()?,
                    self.detector,
                    &registry,
                );
                let never = AtomicBool::new(false);
                worker.drain_range(IndexRange::full(total), self.plan.batch_size, &never)?;
                (vec![worker.finish().partial], None, None)
            }
            _ => {
                let parallel = self.run_parallel(space, &registry, started)?;
                let fallback = if parallel.timed_out {
                    Some(self.complete_sequentially(space, &registry, &parallel.outcomes)?)
                } else {
                    None
                };
                let partials = parallel.outcomes.into_iter().map(|o| o.partial).collect();
                (partials, parallel.producer, fallback)
            }
        };

        let fallback_elapsed = fallback.as_ref().map(|(_, elapsed)| *elapsed);
        let census = merge::merge(total, partials, fallback.map(|(partial, _)| partial))?;

        let detail = self.detector.detail();
        let fallback = census.fallback.zip(fallback_elapsed).map(|(work, elapsed)| FallbackReport {
            deadline: self.timeout.unwrap_or_default(),
            work,
            elapsed,
        });
        let diagnostics = Diagnostics {
            plan: self.plan,
            algorithm: self.detector.algorithm(),
            detail,
            workers: census.workers,
            imbalance_percent: census.imbalance_percent,
            duplicates_discarded: census.duplicates_discarded,
            producer,
            fallback,
            elapsed: started.elapsed(),
        };
        Ok(AggregateResult {
            period_by_cycle: census.period_by_cycle,
            total_period_sum: census.total_period_sum,
            members_by_cycle: match detail {
                Detail::Full => Some(census.members_by_cycle.unwrap_or_default()),
                Detail::PeriodOnly => None,
            },
            diagnostics,
        })
    }

    /// Lays out the work for each worker.
    fn assignments<'q>(
        &self,
        total: u64,
        shared: Option<&Receiver<Vec<Batch>>>,
        queues: Option<&'q StealQueues>,
    ) -> Vec<Assignment<'q>> {
        let workers = self.plan.workers;
        match (self.plan.mode, shared, queues) {
            (ExecutionMode::Dynamic, Some(rx), _) => {
                (0..workers).map(|_| Assignment::Shared(rx.clone())).collect()
            }
            (ExecutionMode::Hybrid, _, Some(queues)) => {
                let (head, _) = IndexRange::full(total).split_at(self.hybrid_head(total));
                split_range(head, workers)
                    .into_iter()
                    .map(|chunk| Assignment::Stealing(chunk, queues))
                    .collect()
            }
            _ => static_chunks(total, workers)
                .into_iter()
                .map(Assignment::Range)
                .collect(),
        }
    }

    /// Length of the statically assigned prefix in hybrid mode.
    fn hybrid_head(&self, total: u64) -> u64 {
        let head = (total as f64 * self.static_fraction.clamp(0.0, 1.0)) as u64;
        head.min(total)
    }

    fn run_parallel<S: StateSpace>(
        &self,
        space: &S,
        registry: &CycleRegistry,
        started: Instant,
    ) -> Result<ParallelOutcome, EnumerationError> {
        let total = self.detector.total();
        let workers = self.plan.workers;
        let poll = self.queue.poll_interval();
        let cancel = AtomicBool::new(false);

        let (shared_tx, shared_rx) = match self.plan.mode {
            ExecutionMode::Dynamic => {
                let (tx, rx) = bounded(self.queue.depth);
                (Some(tx), Some(rx))
            }
            _ => (None, None),
        };
        let steal_queues = match self.plan.mode {
            ExecutionMode::Hybrid => Some(StealQueues::new(workers, self.queue.depth)),
            _ => None,
        };
        let assignments = self.assignments(total, shared_rx.as_ref(), steal_queues.as_ref());
        // Workers hold the only receivers, so a producer notices if they all die.
        drop(shared_rx);

        thread::scope(|scope| {
            let producer = match (shared_tx, steal_queues.as_ref()) {
                (Some(tx), _) => {
                    let batches = BatchStream::new(IndexRange::full(total), self.plan.batch_size);
                    let aggregation = self.queue.aggregation;
                    let cancel = &cancel;
                    Some(spawn_named(scope, "orbit-producer".into(), move || {
                        producer::produce(batches, tx, aggregation, cancel, poll)
                    }))
                }
                (None, Some(queues)) => {
                    let (_, tail) = IndexRange::full(total).split_at(self.hybrid_head(total));
                    let batches = BatchStream::new(tail, self.plan.batch_size);
                    let cancel = &cancel;
                    Some(spawn_named(scope, "orbit-producer".into(), move || {
                        queues.fill(batches, cancel, poll)
                    }))
                }
                (None, None) => None,
            };
            let producer = match producer.transpose() {
                Ok(handle) => handle,
                Err(err) => {
                    cancel.store(true, Ordering::Release);
                    return Err(err);
                }
            };

            let (done_tx, done_rx) = bounded(workers);
            let mut handles = Vec::with_capacity(workers);
            for (index, assignment) in assignments.into_iter().enumerate() {
                let id = WorkerId::new(index);
                let done = done_tx.clone();
                let cancel = &cancel;
                let spawned = spawn_named(scope, format!("orbit-worker-{index}"), move || {
                    let result = self.run_worker(space, registry, id, assignment, cancel, poll);
                    if result.is_err() {
                        cancel.store(true, Ordering::Release);
                    }
                    // The driver only stops listening once every worker is accounted for.
                    let _ = done.send(result);
                });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        cancel.store(true, Ordering::Release);
                        return Err(err);
                    }
                }
            }
            drop(done_tx);

            // A deadline past the end of representable time is no deadline.
            let deadline = self.timeout.and_then(|timeout| started.checked_add(timeout));
            let collected = await_workers(&done_rx, workers, deadline, &cancel);
            // Release a producer still waiting on full queues.
            cancel.store(true, Ordering::Release);

            let mut failure = collected.failure;
            for (index, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() && failure.is_none() {
                    failure = Some(EnumerationError::WorkerPanicked {
                        worker: WorkerId::new(index),
                    });
                }
            }
            let mut report = None;
            if let Some(producer) = producer {
                match producer.join() {
                    Ok(produced) => report = Some(produced),
                    Err(_) => {
                        failure.get_or_insert(EnumerationError::ProducerPanicked);
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(ParallelOutcome {
                    outcomes: collected.outcomes,
                    producer: report,
                    timed_out: collected.timed_out,
                }),
            }
        })
    }

    /// Body of one worker thread.
    fn run_worker<S: StateSpace>(
        &self,
        space: &S,
        registry: &CycleRegistry,
        id: WorkerId,
        assignment: Assignment<'_>,
        cancel: &AtomicBool,
        poll: Duration,
    ) -> Result<WorkerOutcome, TransitionError> {
        let mut worker = Worker::new(id, space.evaluator()?, self.detector, registry);
        debug!(worker = %id, "worker started");
        match assignment {
            Assignment::Range(range) => worker.drain_range(range, self.plan.batch_size, cancel)?,
            Assignment::Shared(queue) => worker.drain_shared(&queue, cancel, poll)?,
            Assignment::Stealing(range, queues) => {
                worker.drain_range(range, self.plan.batch_size, cancel)?;
                worker.drain_stealing(queues, cancel, poll)?;
            }
        }
        Ok(worker.finish())
    }

    /// Finishes the census on the calling thread after a timeout.
    fn complete_sequentially<S: StateSpace>(
        &self,
        space: &S,
        registry: &CycleRegistry,
        outcomes: &[WorkerOutcome],
    ) -> Result<(WorkerPartialResult, Duration), EnumerationError> {
        let started = Instant::now();
        let total = self.detector.total();
        let mut visited = VisitedSet::new(total);
        for outcome in outcomes {
            visited.union_with(&outcome.visited);
        }
        let remaining = total - visited.len();
        warn!(
            remaining,
            claimed = registry.len(),
            "parallel phase timed out; completing sequentially"
        );

        let id = WorkerId::new(self.plan.workers);
        let mut worker = Worker::seeded(id, space.evaluator()?, self.detector, registry, visited);
        let never = AtomicBool::new(false);
        worker.drain_range(IndexRange::full(total), self.plan.batch_size, &never)?;
        Ok((worker.finish().partial, started.elapsed()))
    }
}

/// What the driver gathered from the completion channel.
struct Collected {
    outcomes: Vec<WorkerOutcome>,
    failure: Option<EnumerationError>,
    timed_out: bool,
}

/// Waits for every worker to report, raising `cancel` at the deadline or on
/// the first failure.
fn await_workers(
    done: &Receiver<Result<WorkerOutcome, TransitionError>>,
    workers: usize,
    deadline: Option<Instant>,
    cancel: &AtomicBool,
) -> Collected {
    let mut collected = Collected {
        outcomes: Vec::with_capacity(workers),
        failure: None,
        timed_out: false,
    };
    for _ in 0..workers {
        let message = loop {
            let received = match deadline.filter(|_| !collected.timed_out) {
                Some(at) => done.recv_deadline(at),
                None => done.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(message) => break Some(message),
                Err(RecvTimeoutError::Timeout) => {
                    collected.timed_out = true;
                    cancel.store(true, Ordering::Release);
                    warn!("parallel phase deadline expired; cancelling workers");
                }
                // A worker panicked before reporting.
                Err(RecvTimeoutError::Disconnected) => break None,
            }
        };
        match message {
            Some(Ok(outcome)) => collected.outcomes.push(outcome),
            Some(Err(err)) => {
                cancel.store(true, Ordering::Release);
                collected.failure.get_or_insert(err.into());
            }
            None => break,
        }
    }
    collected
}

fn spawn_named<'scope, 'env, F, T>(
    scope: &'scope thread::Scope<'scope, 'env>,
    name: String,
    body: F,
) -> Result<ScopedJoinHandle<'scope, T>, EnumerationError>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, body)
        .map_err(|source| EnumerationError::Spawn { name, source })
}

/// Logs the plan a request resolved to.
pub(crate) fn log_plan(total: u64, plan: &Plan) {
    info!(
        n = total,
        mode = %plan.mode,
        workers = plan.workers,
        batch_size = plan.batch_size,
        "plan selected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{FnSpace, TryFnSpace};
    use crate::StateIndex;

    fn plan(mode: ExecutionMode, workers: usize, batch_size: u64) -> Plan {
        Plan {
            mode,
            workers,
            batch_size,
        }
    }

    fn scheduler(total: u64, plan: Plan, detail: Detail) -> Scheduler {
        Scheduler::new(
            total,
            plan,
            Algorithm::Enumeration,
            detail,
            &EngineConfig::default(),
            None,
        )
    }

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId::new(3).to_string(), "worker-3");
        assert_eq!(format!("{:?}", WorkerId::new(3)), "WorkerId(3)");
    }

    #[test]
    fn test_every_mode_counts_all_states() {
        let space = FnSpace::new(1_000, |x| (x * 7 + 3) % 1_000);
        for mode in [
            ExecutionMode::Sequential,
            ExecutionMode::Static,
            ExecutionMode::Dynamic,
            ExecutionMode::Hybrid,
        ] {
            let result = scheduler(1_000, plan(mode, 4, 16), Detail::PeriodOnly)
                .run(&space)
                .unwrap();
            assert_eq!(result.total_period_sum, 1_000, "{mode}");
            let processed: u64 = result.diagnostics.workers.iter().map(|w| w.processed).sum();
            assert_eq!(processed, 1_000, "{mode}");
        }
    }

    #[test]
    fn test_producer_report_surfaces_in_diagnostics() {
        let space = FnSpace::new(1_000, |x| (x * 7 + 3) % 1_000);
        for (mode, produced) in [
            (ExecutionMode::Static, None),
            (ExecutionMode::Dynamic, Some(125)),
            (ExecutionMode::Hybrid, Some(32)),
        ] {
            let result = scheduler(1_000, plan(mode, 4, 8), Detail::PeriodOnly)
                .run(&space)
                .unwrap();
            let report = result.diagnostics.producer;
            assert_eq!(report.map(|r| r.batches), produced, "{mode}");
            assert!(report.map_or(true, |r| !r.stopped_early), "{mode}");
        }
    }

    #[test]
    fn test_unrepresentable_deadline_is_no_deadline() {
        let space = FnSpace::new(64, |x| (x + 1) % 64);
        let result = Scheduler::new(
            64,
            plan(ExecutionMode::Static, 4, 4),
            Algorithm::Enumeration,
            Detail::PeriodOnly,
            &EngineConfig::default(),
            Some(Duration::MAX),
        )
        .run(&space)
        .unwrap();
        assert_eq!(result.periods(), vec![64]);
        assert!(result.diagnostics.fallback.is_none());
    }

    #[test]
    fn test_hybrid_head_split() {
        let s = scheduler(100, plan(ExecutionMode::Hybrid, 2, 8), Detail::PeriodOnly);
        assert_eq!(s.hybrid_head(100), 75);
        assert_eq!(s.hybrid_head(0), 0);
    }

    #[test]
    fn test_collaborator_error_stops_all_workers() {
        let space = TryFnSpace::new(512, |i: StateIndex| {
            if i.value() == 300 {
                Err(TransitionError::failed(i, "no successor"))
            } else {
                Ok(StateIndex::new((i.value() + 1) % 512))
            }
        });
        let err = scheduler(512, plan(ExecutionMode::Dynamic, 4, 8), Detail::PeriodOnly)
            .run(&space)
            .unwrap_err();
        assert!(matches!(
            err,
            EnumerationError::Collaborator(TransitionError::Failed { .. })
        ));
    }

    #[test]
    fn test_full_detail_collects_members() {
        let space = FnSpace::new(6, |x| (x + 2) % 6);
        let result = scheduler(6, plan(ExecutionMode::Static, 3, 1), Detail::Full)
            .run(&space)
            .unwrap();
        let members = result.members_by_cycle.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(
            members[&StateIndex::new(1)],
            vec![StateIndex::new(1), StateIndex::new(3), StateIndex::new(5)]
        );
    }
}
