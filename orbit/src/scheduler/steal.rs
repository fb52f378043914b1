//! Per-worker bounded queues for hybrid mode.
//!
//! Each worker owns one queue and may steal from any peer's. A single
//! producer fills the queues round-robin and blocks when every queue is full.
//! Workers exit once they observe [`StealQueues::producer_done`] *before* a
//! scan that finds every queue empty.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::merge::ProducerReport;
use crate::partition::{Batch, BatchStream};

/// One bounded queue per worker.
pub(crate) struct StealQueues {
    senders: Vec<Sender<Batch>>,
    receivers: Vec<Receiver<Batch>>,
    producer_done: AtomicBool,
}

impl StealQueues {
    /// Creates `workers` queues holding at most `depth` batches each.
    pub(crate) fn new(workers: usize, depth: usize) -> Self {
        let (senders, receivers) = (0..workers.max(1)).map(|_| bounded(depth.max(1))).unzip();
        Self {
            senders,
            receivers,
            producer_done: AtomicBool::new(false),
        }
    }

    /// Number of queues.
    pub(crate) fn len(&self) -> usize {
        self.receivers.len()
    }

    /// True once the producer has stopped adding batches.
    pub(crate) fn producer_done(&self) -> bool {
        self.producer_done.load(Ordering::Acquire)
    }

    /// Takes a batch from queue `queue` without blocking.
    pub(crate) fn try_take(&self, queue: usize) -> Option<Batch> {
        self.receivers.get(queue)?.try_recv().ok()
    }

    /// Waits up to `timeout` for a batch on queue `queue`.
    pub(crate) fn take_timeout(&self, queue: usize, timeout: Duration) -> Option<Batch> {
        self.receivers.get(queue)?.recv_timeout(timeout).ok()
    }

    /// Batches currently queued across all queues.
    pub(crate) fn queued(&self) -> usize {
        self.receivers.iter().map(Receiver::len).sum()
    }

    /// Places `batch` directly on queue `queue`. Returns false if it is full.
    #[cfg(test)]
    pub(crate) fn enqueue(&self, queue: usize, batch: Batch) -> bool {
        self.senders[queue].try_send(batch).is_ok()
    }

    /// Streams `batches` into the queues round-robin.
    ///
    /// A full queue is skipped; when all are full the producer blocks on the
    /// next queue in turn, re-checking `cancel` every `poll`. Marks the
    /// producer done on return, whether the stream was exhausted or cancelled.
    pub(crate) fn fill(&self, batches: BatchStream, cancel: &AtomicBool, poll: Duration) -> ProducerReport {
        let report = self.fill_inner(batches, cancel, poll);
        self.producer_done.store(true, Ordering::Release);
        debug!(
            batches = report.batches,
            stopped_early = report.stopped_early,
            queued = self.queued(),
            "hybrid producer finished"
        );
        report
    }

    fn fill_inner(&self, batches: BatchStream, cancel: &AtomicBool, poll: Duration) -> ProducerReport {
        let queues = self.senders.len();
        let mut cursor = 0usize;
        let mut sent = 0u64;
        let stopped = |count: u64| ProducerReport {
            batches: count,
            stopped_early: true,
        };
        'batches: for batch in batches {
            let mut pending = batch;
            for offset in 0..queues {
                match self.senders[(cursor + offset) % queues].try_send(pending) {
                    Ok(()) => {
                        cursor = (cursor + offset + 1) % queues;
                        sent += 1;
                        continue 'batches;
                    }
                    Err(TrySendError::Full(back) | TrySendError::Disconnected(back)) => {
                        pending = back;
                    }
                }
            }
            // Every queue is full: block on the next one in turn.
            loop {
                if cancel.load(Ordering::Acquire) {
                    return stopped(sent);
                }
                match self.senders[cursor].send_timeout(pending, poll) {
                    Ok(()) => {
                        cursor = (cursor + 1) % queues;
                        sent += 1;
                        break;
                    }
                    Err(SendTimeoutError::Timeout(back)) => pending = back,
                    Err(SendTimeoutError::Disconnected(_)) => return stopped(sent),
                }
            }
        }
        ProducerReport {
            batches: sent,
            stopped_early: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::index::IndexRange;

    #[test]
    fn test_round_robin_fill() {
        let queues = StealQueues::new(3, 4);
        let cancel = AtomicBool::new(false);
        let report = queues.fill(BatchStream::new(IndexRange::full(6), 1), &cancel, Duration::from_millis(1));
        assert_eq!(report, ProducerReport { batches: 6, stopped_early: false });
        assert!(queues.producer_done());
        for q in 0..3 {
            assert_eq!(queues.receivers[q].len(), 2);
        }
        assert_eq!(queues.try_take(0).map(|b| b.id()), Some(0));
        assert_eq!(queues.try_take(1).map(|b| b.id()), Some(1));
    }

    #[test]
    fn test_fill_blocks_when_full() {
        let queues = StealQueues::new(2, 1);
        let cancel = AtomicBool::new(false);
        thread::scope(|s| {
            let producer = s.spawn(|| {
                queues.fill(BatchStream::new(IndexRange::full(10), 1), &cancel, Duration::from_millis(1))
            });
            thread::sleep(Duration::from_millis(30));
            assert!(queues.queued() <= 2);
            assert!(!queues.producer_done());

            let mut taken = 0;
            while taken < 10 {
                if queues.try_take(taken % 2).is_some() || queues.try_take((taken + 1) % 2).is_some() {
                    taken += 1;
                } else {
                    thread::yield_now();
                }
                assert!(queues.queued() <= 2);
            }
            assert_eq!(producer.join().unwrap().batches, 10);
        });
    }

    #[test]
    fn test_cancel_releases_blocked_producer() {
        let queues = StealQueues::new(1, 1);
        let cancel = AtomicBool::new(false);
        thread::scope(|s| {
            let producer = s.spawn(|| {
                queues.fill(BatchStream::new(IndexRange::full(100), 1), &cancel, Duration::from_millis(1))
            });
            thread::sleep(Duration::from_millis(10));
            cancel.store(true, Ordering::Release);
            let report = producer.join().unwrap();
            assert_eq!(report.batches, 1);
            assert!(report.stopped_early);
        });
        assert!(queues.producer_done());
    }
}
