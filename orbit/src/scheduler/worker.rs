//! The worker loop shared by every scheduling mode.
//!
//! For each batch entry: skip it if this worker already visited it, otherwise
//! detect its cycle (marking every member visited on the way), then try to
//! claim the cycle. A won claim goes into the partial result; a lost claim is
//! redundant work and is dropped.
//!
//! Cancellation is only observed between batches, so a cycle walk is never
//! abandoned halfway and every visited state belongs to a claimed cycle.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::seq::SliceRandom;
use tracing::{debug, trace};

use super::steal::StealQueues;
use super::WorkerId;
use crate::detector::CycleDetector;
use crate::error::TransitionError;
use crate::index::{IndexRange, StateIndex};
use crate::merge::WorkerPartialResult;
use crate::partition::{Batch, BatchStream};
use crate::registry::CycleRegistry;
use crate::space::Evaluator;
use crate::visited::VisitedSet;

/// What a worker hands back when it exits cleanly.
#[derive(Debug)]
pub(crate) struct WorkerOutcome {
    pub(crate) partial: WorkerPartialResult,
    pub(crate) visited: VisitedSet,
}

/// One worker's private state: evaluator, visited tracker, partial result.
pub(crate) struct Worker<'r, E> {
    id: WorkerId,
    eval: E,
    detector: CycleDetector,
    registry: &'r CycleRegistry,
    visited: VisitedSet,
    partial: WorkerPartialResult,
}

impl<'r, E: Evaluator> Worker<'r, E> {
    pub(crate) fn new(
        id: WorkerId,
        eval: E,
        detector: CycleDetector,
        registry: &'r CycleRegistry,
    ) -> Self {
        let visited = VisitedSet::new(detector.total());
        Self::seeded(id, eval, detector, registry, visited)
    }

    /// A worker that starts with `visited` already marked.
    pub(crate) fn seeded(
        id: WorkerId,
        eval: E,
        detector: CycleDetector,
        registry: &'r CycleRegistry,
        visited: VisitedSet,
    ) -> Self {
        Self {
            id,
            eval,
            detector,
            registry,
            visited,
            partial: WorkerPartialResult::new(id),
        }
    }

    /// Processes one start candidate.
    fn process(&mut self, start: StateIndex) -> Result<(), TransitionError> {
        if self.visited.contains(start) {
            self.partial.note_skipped();
            return Ok(());
        }
        let visited = &mut self.visited;
        let detection = self.detector.detect_with(&mut self.eval, start, |member| {
            visited.insert(member);
        })?;
        self.partial.note_detection(detection.transition_calls);

        let cycle = detection.cycle;
        if self.registry.claim(cycle.canonical_key(), self.id) {
            trace!(worker = %self.id, %cycle, "claimed");
            self.partial.record(cycle);
        } else {
            self.partial.note_claim_lost();
        }
        Ok(())
    }

    /// Processes every entry of `batch`.
    pub(crate) fn process_batch(&mut self, batch: Batch, stolen: bool) -> Result<(), TransitionError> {
        self.partial.note_batch(stolen);
        for start in batch {
            self.process(start)?;
        }
        Ok(())
    }

    /// Drains a contiguous range in batches, stopping early on cancellation.
    pub(crate) fn drain_range(
        &mut self,
        range: IndexRange,
        batch_size: u64,
        cancel: &AtomicBool,
    ) -> Result<(), TransitionError> {
        for batch in BatchStream::new(range, batch_size) {
            if cancel.load(Ordering::Acquire) {
                break;
            }
            self.process_batch(batch, false)?;
        }
        Ok(())
    }

    /// Pulls batch groups from a shared queue until the producer hangs up or
    /// the run is cancelled.
    pub(crate) fn drain_shared(
        &mut self,
        queue: &Receiver<Vec<Batch>>,
        cancel: &AtomicBool,
        poll: Duration,
    ) -> Result<(), TransitionError> {
        loop {
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            match queue.recv_timeout(poll) {
                Ok(group) => {
                    for batch in group {
                        if cancel.load(Ordering::Acquire) {
                            return Ok(());
                        }
                        self.process_batch(batch, false)?;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Takes batches from this worker's own queue, then from peers in random
    /// order, until every queue is empty and the producer is done.
    pub(crate) fn drain_stealing(
        &mut self,
        queues: &StealQueues,
        cancel: &AtomicBool,
        poll: Duration,
    ) -> Result<(), TransitionError> {
        let own = self.id.index();
        let mut peers: Vec<usize> = (0..queues.len()).filter(|&q| q != own).collect();
        let mut rng = rand::thread_rng();
        loop {
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            // Read the flag before scanning: once it is set and the scan
            // comes up empty, nothing more can arrive.
            let producer_done = queues.producer_done();

            if let Some(batch) = queues.try_take(own) {
                self.process_batch(batch, false)?;
                continue;
            }
            peers.shuffle(&mut rng);
            if let Some(batch) = peers.iter().find_map(|&peer| queues.try_take(peer)) {
                self.process_batch(batch, true)?;
                continue;
            }
            if producer_done {
                return Ok(());
            }
            if let Some(batch) = queues.take_timeout(own, poll) {
                self.process_batch(batch, false)?;
            }
        }
    }

    /// Exits the worker, handing back its partial result and tracker.
    pub(crate) fn finish(self) -> WorkerOutcome {
        debug!(
            worker = %self.id,
            cycles = self.partial.periods().len(),
            processed = self.partial.processed_count(),
            skipped = self.partial.skipped_count(),
            "worker finished"
        );
        WorkerOutcome {
            partial: self.partial,
            visited: self.visited,
        }
    }
}
