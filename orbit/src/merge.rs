//! Result merging, invariant checking, and load-balance diagnostics.
//!
//! # Merge Rules
//!
//! 1. Partial results are merged in ascending worker id order.
//! 2. A canonical key seen twice keeps the lowest worker id's entry. With a
//!    correct registry this cannot happen; it is still checked.
//! 3. A key seen twice with *different* periods is an [`InvariantViolation`].
//! 4. The periods of all distinct keys must sum to `N`, or the merge fails.
//!
//! The merge never returns a census that breaks rule 4.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::cycle::{Algorithm, Cycle, Detail};
use crate::error::InvariantViolation;
use crate::index::StateIndex;
use crate::scheduler::WorkerId;
use crate::select::Plan;

// =============================================================================
// Per-worker partial results
// =============================================================================

/// Everything one worker learned, owned exclusively by that worker until it
/// is handed to the merger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPartialResult {
    worker: WorkerId,
    periods: BTreeMap<StateIndex, u64>,
    members: BTreeMap<StateIndex, Vec<StateIndex>>,
    processed_count: u64,
    skipped_count: u64,
    detect_calls: u64,
    transition_calls: u64,
    claims_lost: u64,
    batches: u64,
    stolen: u64,
}

impl WorkerPartialResult {
    /// Creates an empty partial result for `worker`.
    #[must_use]
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            periods: BTreeMap::new(),
            members: BTreeMap::new(),
            processed_count: 0,
            skipped_count: 0,
            detect_calls: 0,
            transition_calls: 0,
            claims_lost: 0,
            batches: 0,
            stolen: 0,
        }
    }

    /// Worker that produced this result.
    #[must_use]
    pub const fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Records an owned cycle. Its period counts toward `processed_count`.
    pub fn record(&mut self, cycle: Cycle) {
        let key = cycle.canonical_key();
        let period = cycle.period();
        self.processed_count += period;
        self.periods.insert(key, period);
        if let Some(members) = cycle.into_members() {
            self.members.insert(key, members);
        }
    }

    /// Owned cycles: `canonical_key → period`.
    #[must_use]
    pub const fn periods(&self) -> &BTreeMap<StateIndex, u64> {
        &self.periods
    }

    /// States accounted for by this worker's owned cycles.
    #[must_use]
    pub const fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Batch entries skipped because this worker had already visited them.
    #[must_use]
    pub const fn skipped_count(&self) -> u64 {
        self.skipped_count
    }

    /// Batches consumed, own and stolen.
    #[must_use]
    pub const fn batch_count(&self) -> u64 {
        self.batches
    }

    /// Batches taken from a peer's queue.
    #[must_use]
    pub const fn stolen_count(&self) -> u64 {
        self.stolen
    }

    pub(crate) fn note_skipped(&mut self) {
        self.skipped_count += 1;
    }

    pub(crate) fn note_detection(&mut self, transition_calls: u64) {
        self.detect_calls += 1;
        self.transition_calls += transition_calls;
    }

    pub(crate) fn note_claim_lost(&mut self) {
        self.claims_lost += 1;
    }

    pub(crate) fn note_batch(&mut self, stolen: bool) {
        self.batches += 1;
        self.stolen += u64::from(stolen);
    }

    fn report(&self, processed: u64, cycles: u64) -> WorkerReport {
        WorkerReport {
            worker: self.worker,
            processed,
            skipped: self.skipped_count,
            cycles,
            detect_calls: self.detect_calls,
            transition_calls: self.transition_calls,
            claims_lost: self.claims_lost,
            batches: self.batches,
            stolen: self.stolen,
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Work done by one worker (or by the sequential fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Reporting worker.
    pub worker: WorkerId,
    /// States accounted for by cycles this worker owns in the merged census.
    pub processed: u64,
    /// Batch entries skipped as already visited.
    pub skipped: u64,
    /// Cycles owned in the merged census.
    pub cycles: u64,
    /// Cycle detector invocations.
    pub detect_calls: u64,
    /// Transition function calls across all detections.
    pub transition_calls: u64,
    /// Detections discarded because another worker owned the cycle.
    pub claims_lost: u64,
    /// Batches consumed.
    pub batches: u64,
    /// Batches taken from a peer's queue.
    pub stolen: u64,
}

/// Sequential completion after the parallel phase missed its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackReport {
    /// Deadline that expired.
    pub deadline: Duration,
    /// Work done by the sequential pass.
    pub work: WorkerReport,
    /// Time spent in the sequential pass.
    pub elapsed: Duration,
}

/// How the batch producer of a dynamic or hybrid run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerReport {
    /// Batches handed to the queues.
    pub batches: u64,
    /// True if cancellation or a vanished consumer side stopped production.
    pub stopped_early: bool,
}

/// Scheduling telemetry. Informational only and run-dependent: batch
/// distribution and claim races differ between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Resolved execution plan.
    pub plan: Plan,
    /// Detection algorithm used.
    pub algorithm: Algorithm,
    /// Detail level used.
    pub detail: Detail,
    /// Per-worker reports, ordered by worker id.
    pub workers: Vec<WorkerReport>,
    /// `(max − avg) / avg × 100` over per-worker `processed` counts.
    pub imbalance_percent: f64,
    /// Duplicate registry entries dropped by the merger.
    pub duplicates_discarded: u64,
    /// Present for modes with a background producer.
    pub producer: Option<ProducerReport>,
    /// Present when the parallel phase timed out.
    pub fallback: Option<FallbackReport>,
    /// Wall time of the whole call.
    pub elapsed: Duration,
}

/// Load imbalance of per-worker counts: `(max − avg) / avg × 100`.
///
/// Returns 0 for an empty slice or when no work was done.
///
/// ```
/// use uor_orbit::merge::imbalance_percent;
///
/// assert_eq!(imbalance_percent(&[16, 0, 0, 0]), 300.0);
/// assert_eq!(imbalance_percent(&[5, 5]), 0.0);
/// ```
#[must_use]
pub fn imbalance_percent(counts: &[u64]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let sum: f64 = counts.iter().map(|&c| c as f64).sum();
    let avg = sum / counts.len() as f64;
    if avg == 0.0 {
        return 0.0;
    }
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    (max - avg) / avg * 100.0
}

// =============================================================================
// Aggregate result
// =============================================================================

/// The merged census of one enumeration request.
///
/// `period_by_cycle`, `total_period_sum`, and `members_by_cycle` are a pure
/// function of the state space; [`AggregateResult::same_census`] compares
/// exactly those. `diagnostics` describe how this particular run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// `canonical_key → period` for every cycle.
    pub period_by_cycle: BTreeMap<StateIndex, u64>,
    /// Σ period; always equal to `N`.
    pub total_period_sum: u64,
    /// `canonical_key → members` (starting at the key) in full detail.
    pub members_by_cycle: Option<BTreeMap<StateIndex, Vec<StateIndex>>>,
    /// Scheduling telemetry.
    pub diagnostics: Diagnostics,
}

impl AggregateResult {
    /// Number of distinct cycles.
    #[must_use]
    pub fn cycle_count(&self) -> usize {
        self.period_by_cycle.len()
    }

    /// Period of the cycle keyed by `key`.
    #[must_use]
    pub fn period_of(&self, key: StateIndex) -> Option<u64> {
        self.period_by_cycle.get(&key).copied()
    }

    /// Cycle structure: `period → number of cycles with that period`.
    ///
    /// This is the period multiset, independent of scheduling.
    #[must_use]
    pub fn cycle_structure(&self) -> BTreeMap<u64, u64> {
        let mut structure = BTreeMap::new();
        for &period in self.period_by_cycle.values() {
            *structure.entry(period).or_insert(0) += 1;
        }
        structure
    }

    /// Sorted list of all periods, one entry per cycle.
    #[must_use]
    pub fn periods(&self) -> Vec<u64> {
        let mut periods: Vec<u64> = self.period_by_cycle.values().copied().collect();
        periods.sort_unstable();
        periods
    }

    /// Canonical key of the cycle containing `index`.
    ///
    /// Needs full detail; scans the member lists.
    #[must_use]
    pub fn canonical_key_of(&self, index: StateIndex) -> Option<StateIndex> {
        self.members_by_cycle.as_ref()?.iter().find_map(|(key, members)| {
            members.contains(&index).then_some(*key)
        })
    }

    /// All cycles in canonical key order, with members when collected.
    pub fn cycles(&self) -> impl Iterator<Item = Cycle> + '_ {
        self.period_by_cycle.iter().map(|(&key, &period)| {
            self.members_by_cycle
                .as_ref()
                .and_then(|all| all.get(&key))
                .and_then(|members| Cycle::from_members(members.clone()))
                .unwrap_or(Cycle::new(key, period))
        })
    }

    /// True if both results describe the same census, ignoring diagnostics.
    #[must_use]
    pub fn same_census(&self, other: &Self) -> bool {
        self.period_by_cycle == other.period_by_cycle
            && self.total_period_sum == other.total_period_sum
            && self.members_by_cycle == other.members_by_cycle
    }
}

// =============================================================================
// Merger
// =============================================================================

/// Output of [`merge`]: the census plus per-worker accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCensus {
    /// `canonical_key → period`.
    pub period_by_cycle: BTreeMap<StateIndex, u64>,
    /// Σ period, checked equal to `N`.
    pub total_period_sum: u64,
    /// Member lists, when any worker collected them.
    pub members_by_cycle: Option<BTreeMap<StateIndex, Vec<StateIndex>>>,
    /// Reports for the parallel workers, by worker id.
    pub workers: Vec<WorkerReport>,
    /// Report for the sequential fallback pass, if one ran.
    pub fallback: Option<WorkerReport>,
    /// `(max − avg) / avg × 100` over the parallel workers.
    pub imbalance_percent: f64,
    /// Duplicate keys dropped.
    pub duplicates_discarded: u64,
}

/// Merges partial results and enforces the accounting invariants.
///
/// `fallback` is the sequential pass's partial result, if one ran; it takes
/// part in deduplication like any worker but is reported separately.
///
/// # Errors
///
/// Returns [`InvariantViolation`] if two entries share a key with different
/// periods, or if the periods do not sum to `total`.
pub fn merge(
    total: u64,
    mut partials: Vec<WorkerPartialResult>,
    fallback: Option<WorkerPartialResult>,
) -> Result<MergedCensus, InvariantViolation> {
    partials.sort_by_key(WorkerPartialResult::worker);
    let parallel_count = partials.len();
    partials.extend(fallback);

    let mut owners: BTreeMap<StateIndex, (WorkerId, u64)> = BTreeMap::new();
    let mut duplicates_discarded = 0u64;
    for partial in &partials {
        for (&key, &period) in &partial.periods {
            match owners.get(&key) {
                None => {
                    owners.insert(key, (partial.worker, period));
                }
                Some(&(kept_by, kept)) if kept == period => {
                    duplicates_discarded += 1;
                    warn!(
                        %key,
                        kept_by = %kept_by,
                        dropped = %partial.worker,
                        "duplicate cycle entry discarded"
                    );
                }
                Some(&(kept_by, kept)) => {
                    let violation = InvariantViolation::ConflictingPeriods {
                        key,
                        kept,
                        kept_by,
                        other: period,
                        other_by: partial.worker,
                    };
                    error!(%violation, "merge aborted");
                    return Err(violation);
                }
            }
        }
    }

    let mut total_period_sum: u64 = 0;
    let mut processed: BTreeMap<WorkerId, u64> = BTreeMap::new();
    for &(owner, period) in owners.values() {
        total_period_sum = match total_period_sum.checked_add(period) {
            Some(sum) => sum,
            None => {
                let violation = InvariantViolation::PeriodSumOverflow { total };
                error!(%violation, "merge aborted");
                return Err(violation);
            }
        };
        *processed.entry(owner).or_insert(0) += period;
    }
    if total_period_sum != total {
        let violation = InvariantViolation::PeriodSum {
            sum: total_period_sum,
            total,
        };
        error!(%violation, "merge aborted");
        return Err(violation);
    }

    let report_for = |partial: &WorkerPartialResult| {
        let cycles = owners
            .values()
            .filter(|(owner, _)| *owner == partial.worker)
            .count() as u64;
        partial.report(processed.get(&partial.worker).copied().unwrap_or(0), cycles)
    };
    let workers: Vec<WorkerReport> = partials[..parallel_count].iter().map(report_for).collect();
    let fallback = partials.get(parallel_count).map(report_for);
    let imbalance = imbalance_percent(&workers.iter().map(|w| w.processed).collect::<Vec<_>>());

    let collected_members = partials.iter().any(|p| !p.members.is_empty());
    let members_by_cycle = collected_members.then(|| {
        let mut all = BTreeMap::new();
        for (&key, &(owner, _)) in &owners {
            let members = partials
                .iter()
                .find(|p| p.worker == owner)
                .and_then(|p| p.members.get(&key));
            if let Some(members) = members {
                all.insert(key, members.clone());
            }
        }
        all
    });

    Ok(MergedCensus {
        period_by_cycle: owners.into_iter().map(|(k, (_, p))| (k, p)).collect(),
        total_period_sum,
        members_by_cycle,
        workers,
        fallback,
        imbalance_percent: imbalance,
        duplicates_discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(worker: usize, cycles: &[(u64, u64)]) -> WorkerPartialResult {
        let mut p = WorkerPartialResult::new(WorkerId::new(worker));
        for &(key, period) in cycles {
            p.record(Cycle::new(StateIndex::new(key), period));
        }
        p
    }

    #[test]
    fn test_merge_disjoint() {
        let merged = merge(8, vec![partial(1, &[(2, 6)]), partial(0, &[(0, 2)])], None).unwrap();
        assert_eq!(merged.total_period_sum, 8);
        assert_eq!(merged.period_by_cycle.len(), 2);
        assert_eq!(merged.workers[0].worker, WorkerId::new(0));
        assert_eq!(merged.workers[0].processed, 2);
        assert_eq!(merged.workers[1].processed, 6);
        assert_eq!(merged.duplicates_discarded, 0);
    }

    #[test]
    fn test_duplicate_keeps_lowest_worker() {
        let merged = merge(
            8,
            vec![partial(2, &[(2, 6)]), partial(1, &[(0, 2), (2, 6)])],
            None,
        )
        .unwrap();
        assert_eq!(merged.duplicates_discarded, 1);
        assert_eq!(merged.total_period_sum, 8);
        // Worker 1 keeps both cycles; worker 2's copy is dropped.
        assert_eq!(merged.workers[0].processed, 8);
        assert_eq!(merged.workers[0].cycles, 2);
        assert_eq!(merged.workers[1].processed, 0);
        assert_eq!(merged.workers[1].cycles, 0);
    }

    #[test]
    fn test_conflicting_periods_rejected() {
        let err = merge(8, vec![partial(0, &[(2, 6)]), partial(3, &[(2, 5), (0, 2)])], None)
            .unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::ConflictingPeriods {
                key: StateIndex::new(2),
                kept: 6,
                kept_by: WorkerId::new(0),
                other: 5,
                other_by: WorkerId::new(3),
            }
        );
    }

    #[test]
    fn test_period_sum_mismatch_rejected() {
        let err = merge(8, vec![partial(0, &[(0, 2)])], None).unwrap_err();
        assert_eq!(err, InvariantViolation::PeriodSum { sum: 2, total: 8 });
    }

    #[test]
    fn test_period_sum_overflow_rejected() {
        let err = merge(
            u64::MAX,
            vec![partial(0, &[(0, u64::MAX)]), partial(1, &[(1, 2)])],
            None,
        )
        .unwrap_err();
        assert_eq!(err, InvariantViolation::PeriodSumOverflow { total: u64::MAX });
    }

    #[test]
    fn test_fallback_reported_separately() {
        let merged = merge(
            8,
            vec![partial(0, &[(0, 2)]), partial(1, &[])],
            Some(partial(2, &[(2, 6)])),
        )
        .unwrap();
        assert_eq!(merged.workers.len(), 2);
        let fallback = merged.fallback.unwrap();
        assert_eq!(fallback.processed, 6);
        assert_eq!(merged.imbalance_percent, 100.0);
    }

    #[test]
    fn test_members_follow_owner() {
        let mut a = WorkerPartialResult::new(WorkerId::new(0));
        a.record(Cycle::from_members(vec![StateIndex::new(1), StateIndex::new(0)]).unwrap());
        let merged = merge(2, vec![a], None).unwrap();
        let members = merged.members_by_cycle.unwrap();
        assert_eq!(
            members[&StateIndex::ZERO],
            vec![StateIndex::new(0), StateIndex::new(1)]
        );
    }

    #[test]
    fn test_imbalance() {
        assert_eq!(imbalance_percent(&[]), 0.0);
        assert_eq!(imbalance_percent(&[0, 0]), 0.0);
        assert_eq!(imbalance_percent(&[3, 1]), 50.0);
        assert_eq!(imbalance_percent(&[16, 0, 0, 0]), 300.0);
    }
}
