use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters observing generator behavior.
///
/// All counters use relaxed ordering: they are observability, not
/// synchronization. The sequence lock already orders the events being
/// counted.
#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    ids: AtomicU64,
    sequence_overflows: AtomicU64,
    clock_backwards: AtomicU64,
    waits: AtomicU64,
    wait_micros: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn record_ids(&self, n: u64) {
        self.ids.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_sequence_overflow(&self) {
        self.sequence_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_clock_backward(&self) {
        self.clock_backwards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait_started(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait_time(&self, waited: Duration) {
        self.wait_micros
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ids: self.ids.load(Ordering::Relaxed),
            sequence_overflows: self.sequence_overflows.load(Ordering::Relaxed),
            clock_backwards: self.clock_backwards.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            total_wait: Duration::from_micros(self.wait_micros.load(Ordering::Relaxed)),
        }
    }
}

/// A point-in-time copy of a generator's counters.
///
/// Counters are read individually with relaxed loads, so a snapshot taken
/// while other threads are generating may be internally skewed by a few
/// events. Within one thread, counts never decrease between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Identifiers issued, across both single and batch paths.
    pub ids: u64,
    /// Times the 12-bit sequence filled up within one millisecond, forcing a
    /// wait for the next tick.
    pub sequence_overflows: u64,
    /// Times the clock source reported a reading behind the watermark.
    pub clock_backwards: u64,
    /// Wait phases entered (sequence overflow or bounded backward wait).
    pub waits: u64,
    /// Total time spent in wait phases.
    pub total_wait: Duration,
}
