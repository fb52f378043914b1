//! Background batch producer for dynamic mode.
//!
//! Batches are grouped `aggregation` to a message so workers touch the queue
//! less often. The queue is bounded: when it holds `depth` messages the
//! producer blocks, waking every poll interval to check for cancellation.
//! At most `depth × aggregation` batches are ever materialised ahead of the
//! workers.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::debug;

use crate::merge::ProducerReport;
use crate::partition::{Batch, BatchStream};

/// Feeds `batches` into `queue` in groups of `aggregation`.
///
/// Consumes the sender, so workers see the queue disconnect once it drains.
pub(crate) fn produce(
    batches: BatchStream,
    queue: Sender<Vec<Batch>>,
    aggregation: usize,
    cancel: &AtomicBool,
    poll: Duration,
) -> ProducerReport {
    let aggregation = aggregation.max(1);
    let mut report = ProducerReport {
        batches: 0,
        stopped_early: false,
    };
    let mut batches = batches.peekable();
    while batches.peek().is_some() {
        let group: Vec<Batch> = batches.by_ref().take(aggregation).collect();
        let count = group.len() as u64;
        if !send_blocking(&queue, group, cancel, poll) {
            report.stopped_early = true;
            break;
        }
        report.batches += count;
    }
    debug!(
        batches = report.batches,
        stopped_early = report.stopped_early,
        "dynamic producer finished"
    );
    report
}

/// Sends with backpressure. Returns false if cancelled or disconnected.
fn send_blocking(
    queue: &Sender<Vec<Batch>>,
    mut group: Vec<Batch>,
    cancel: &AtomicBool,
    poll: Duration,
) -> bool {
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        match queue.send_timeout(group, poll) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => group = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
