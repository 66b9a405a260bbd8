mod builder;
mod policy;
#[cfg(test)]
mod tests;

pub use builder::GeneratorBuilder;
pub use policy::{BackwardPolicy, WaitStrategy};

use crate::error::{BatchError, ConfigError, Error};
use crate::id::{DecodedInfo, SnowflakeId};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::time::{ClockSource, MonotonicClock};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Poll interval while waiting for the clock to leave an exhausted
/// millisecond.
const SEQUENCE_POLL: Duration = Duration::from_micros(100);

/// Poll interval while waiting out a backward clock regression.
const BACKWARD_POLL: Duration = Duration::from_millis(1);

/// How far beyond "now" a decoded timestamp may lie before
/// [`Generator::validate`] rejects it. A sanity bound against malformed or
/// adversarial input, not a cryptographic guarantee.
pub const FORWARD_SKEW_TOLERANCE_MS: i64 = 5 * 60 * 1_000;

/// The watermark: the last millisecond an ID was issued in, and the sequence
/// consumed within it. The only shared mutable state in the engine, touched
/// exclusively inside the lock.
#[derive(Debug)]
struct SequenceState {
    /// Last millisecond reading an ID was issued for; `-1` means none yet.
    last_timestamp: i64,
    sequence: i64,
}

impl SequenceState {
    fn new() -> Self {
        Self {
            last_timestamp: -1,
            sequence: 0,
        }
    }
}

/// Outcome of one attempt to advance the watermark.
enum Step {
    Ready(SnowflakeId),
    Backoff(Backoff),
}

/// Why an attempt could not produce an ID yet.
#[derive(Debug, Clone, Copy)]
enum Backoff {
    /// All 4096 sequence slots of the current millisecond are used.
    SequenceExhausted,
    /// The clock is behind the watermark and the policy is waiting it out.
    ClockBehind { backwards_ms: i64 },
}

/// An effective timestamp for the next ID, after the backward policy has
/// had its say.
enum Now {
    At(i64),
    Backoff(Backoff),
}

/// A process-local Snowflake-style ID generator.
///
/// One instance owns one (datacenter, worker) identity and one sequence
/// watermark behind a single mutex. Concurrent callers are
/// linearized by the lock: the order threads acquire it is the order their
/// IDs sort in. Two generators (distinct worker identities) share no state.
///
/// Uniqueness across processes is an operational assumption: every process
/// must be configured with a distinct (datacenter, worker) pair. The engine
/// does not verify this against peers.
///
/// # Example
///
/// ```
/// use floe::Generator;
///
/// let generator = Generator::new(1, 1).unwrap();
/// let a = generator.next_id().unwrap();
/// let b = generator.next_id().unwrap();
/// assert!(b > a);
///
/// let info = generator.parse(a.to_raw()).unwrap();
/// assert_eq!(info.datacenter_id, 1);
/// assert_eq!(info.worker_id, 1);
/// ```
pub struct Generator<C = MonotonicClock> {
    datacenter_id: i64,
    worker_id: i64,
    epoch_ms: i64,
    clock: C,
    policy: BackwardPolicy,
    tolerance_ms: i64,
    backward_retries: u32,
    wait: WaitStrategy,
    max_batch: usize,
    stall_limit: Option<Duration>,
    metrics: Option<MetricsRecorder>,
    state: Mutex<SequenceState>,
}

impl Generator<MonotonicClock> {
    /// Creates a generator with the given identity and every option at its
    /// default (see [`GeneratorBuilder`] for the defaults table).
    ///
    /// # Errors
    ///
    /// Fails closed if either ID is outside `0..=31`.
    pub fn new(datacenter_id: i64, worker_id: i64) -> Result<Self, ConfigError> {
        Self::builder(datacenter_id, worker_id).build()
    }

    /// Starts a builder for a generator with the given identity.
    pub fn builder(datacenter_id: i64, worker_id: i64) -> GeneratorBuilder<MonotonicClock> {
        GeneratorBuilder::new(datacenter_id, worker_id)
    }
}

impl<C: ClockSource> Generator<C> {
    /// The configured datacenter ID.
    pub fn datacenter_id(&self) -> i64 {
        self.datacenter_id
    }

    /// The configured worker ID.
    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }

    /// The configured epoch, in milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.epoch_ms
    }

    /// Generates the next identifier.
    ///
    /// Acquires the state lock, reads the clock, advances or resets the
    /// sequence, and returns the packed value. When the current millisecond
    /// has no sequence slots left, the call waits for the clock to tick
    /// rather than borrowing from the next millisecond out of order; whether
    /// that wait holds the lock is the configured [`WaitStrategy`].
    ///
    /// # Errors
    ///
    /// - [`Error::ClockMovedBackwards`] per the configured
    ///   [`BackwardPolicy`]
    /// - [`Error::TimestampOverflow`] when the epoch delta leaves the 41-bit
    ///   window (fatal: the window never recovers)
    /// - [`Error::ClockStalled`] when a stall limit is configured and the
    ///   clock refuses to advance
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self) -> Result<SnowflakeId, Error> {
        let mut wait_started: Option<Instant> = None;
        let mut backward_polls: u32 = 0;

        let mut state = self.state.lock();
        loop {
            match self.try_advance(&mut state) {
                Err(e) => {
                    self.finish_wait(wait_started.take());
                    return Err(e);
                }
                Ok(Step::Ready(id)) => {
                    if let Some(m) = &self.metrics {
                        m.record_ids(1);
                    }
                    self.finish_wait(wait_started.take());
                    return Ok(id);
                }
                Ok(Step::Backoff(backoff)) => {
                    if wait_started.is_none() {
                        wait_started = Some(Instant::now());
                        self.note_backoff(backoff);
                    }
                    if let Backoff::ClockBehind { backwards_ms } = backoff {
                        backward_polls += 1;
                        if backward_polls > self.backward_retries {
                            self.finish_wait(wait_started.take());
                            return Err(Error::ClockMovedBackwards { backwards_ms });
                        }
                    }
                    if let Some(waited) = self.stalled(wait_started) {
                        self.finish_wait(wait_started.take());
                        return Err(Error::ClockStalled { waited });
                    }
                    let pause = match backoff {
                        Backoff::SequenceExhausted => SEQUENCE_POLL,
                        Backoff::ClockBehind { .. } => BACKWARD_POLL,
                    };
                    match self.wait {
                        WaitStrategy::HoldLock => thread::sleep(pause),
                        WaitStrategy::ReleaseLock => {
                            drop(state);
                            thread::sleep(pause);
                            state = self.state.lock();
                        }
                    }
                }
            }
        }
    }

    /// Generates `n` identifiers under one lock acquisition.
    ///
    /// Sequence slots remaining in the current millisecond are emitted
    /// without re-reading the clock; the clock is consulted again only when
    /// a millisecond's capacity is exhausted. Per-identifier invariants are
    /// identical to [`next_id`].
    ///
    /// The batch path always holds the lock for its whole run, including
    /// waits at millisecond boundaries; the single-acquisition amortization
    /// is its contract, so [`WaitStrategy`] does not apply here.
    ///
    /// # Errors
    ///
    /// `1 <= n <= max_batch_size` is checked before any state mutation;
    /// violations return [`Error::InvalidBatchSize`] with an empty partial.
    /// A clock-backward or overflow failure mid-batch returns every ID
    /// issued so far alongside the first error, and the caller decides
    /// whether to use the partial slice.
    ///
    /// [`next_id`]: Generator::next_id
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id_batch(&self, n: usize) -> Result<Vec<SnowflakeId>, BatchError> {
        if n == 0 || n > self.max_batch {
            return Err(BatchError {
                ids: Vec::new(),
                requested: n,
                source: Error::InvalidBatchSize {
                    requested: n,
                    max: self.max_batch,
                },
            });
        }

        let mut ids: Vec<SnowflakeId> = Vec::with_capacity(n);
        let mut wait_started: Option<Instant> = None;
        let mut backward_polls: u32 = 0;

        let mut state = self.state.lock();
        while ids.len() < n {
            let backoff = match self.resolve_now(&state) {
                Err(source) => return self.fail_batch(ids, n, wait_started.take(), source),
                Ok(Now::Backoff(b)) => Some(b),
                Ok(Now::At(now)) => {
                    let delta = now - self.epoch_ms;
                    if delta < 0 || delta > SnowflakeId::MAX_TIMESTAMP {
                        return self.fail_batch(
                            ids,
                            n,
                            wait_started.take(),
                            Error::TimestampOverflow { delta_ms: delta },
                        );
                    }
                    if now == state.last_timestamp
                        && state.sequence >= SnowflakeId::MAX_SEQUENCE
                    {
                        Some(Backoff::SequenceExhausted)
                    } else {
                        let first_seq = if now == state.last_timestamp {
                            state.sequence + 1
                        } else {
                            state.last_timestamp = now;
                            0
                        };
                        let available = (SnowflakeId::MAX_SEQUENCE - first_seq + 1) as usize;
                        let take = available.min(n - ids.len());
                        for seq in first_seq..first_seq + take as i64 {
                            ids.push(SnowflakeId::from_components(
                                delta,
                                self.datacenter_id,
                                self.worker_id,
                                seq,
                            ));
                        }
                        state.sequence = first_seq + take as i64 - 1;
                        if let Some(m) = &self.metrics {
                            m.record_ids(take as u64);
                        }
                        self.finish_wait(wait_started.take());
                        backward_polls = 0;
                        None
                    }
                }
            };

            if let Some(backoff) = backoff {
                if wait_started.is_none() {
                    wait_started = Some(Instant::now());
                    self.note_backoff(backoff);
                }
                if let Backoff::ClockBehind { backwards_ms } = backoff {
                    backward_polls += 1;
                    if backward_polls > self.backward_retries {
                        return self.fail_batch(
                            ids,
                            n,
                            wait_started.take(),
                            Error::ClockMovedBackwards { backwards_ms },
                        );
                    }
                }
                if let Some(waited) = self.stalled(wait_started) {
                    return self.fail_batch(
                        ids,
                        n,
                        wait_started.take(),
                        Error::ClockStalled { waited },
                    );
                }
                thread::sleep(match backoff {
                    Backoff::SequenceExhausted => SEQUENCE_POLL,
                    Backoff::ClockBehind { .. } => BACKWARD_POLL,
                });
            }
        }

        Ok(ids)
    }

    /// Decodes an identifier against this generator's epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for zero or negative input.
    pub fn parse(&self, id: i64) -> Result<DecodedInfo, Error> {
        DecodedInfo::decode(id, self.epoch_ms)
    }

    /// Structural plus sanity-bound validation.
    ///
    /// On top of [`parse`], rejects identifiers whose reconstructed
    /// timestamp lies more than [`FORWARD_SKEW_TOLERANCE_MS`] beyond the
    /// current clock reading. Timestamps before the epoch cannot be encoded
    /// at all (the delta field is non-negative by construction), so the
    /// structural check already covers that side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] naming the failed check.
    ///
    /// [`parse`]: Generator::parse
    pub fn validate(&self, id: i64) -> Result<(), Error> {
        let info = self.parse(id)?;
        let now = self.clock.now_millis();
        if info.timestamp_millis > now + FORWARD_SKEW_TOLERANCE_MS {
            return Err(Error::InvalidId {
                id,
                reason: "timestamp is beyond the forward clock-skew tolerance",
            });
        }
        Ok(())
    }

    /// A snapshot of the generator's counters, or `None` when metrics were
    /// not enabled at construction.
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(MetricsRecorder::snapshot)
    }

    /// Attempts one advance of the watermark under the lock.
    fn try_advance(&self, state: &mut SequenceState) -> Result<Step, Error> {
        match self.resolve_now(state)? {
            Now::Backoff(b) => Ok(Step::Backoff(b)),
            Now::At(now) => self.advance_at(state, now),
        }
    }

    /// Reads the clock and applies the backward policy if the reading is
    /// behind the watermark.
    fn resolve_now(&self, state: &SequenceState) -> Result<Now, Error> {
        let now = self.clock.now_millis();
        if now >= state.last_timestamp {
            return Ok(Now::At(now));
        }
        self.clock_behind(state, now)
    }

    #[cold]
    #[inline(never)]
    fn clock_behind(&self, state: &SequenceState, now: i64) -> Result<Now, Error> {
        let backwards_ms = state.last_timestamp - now;
        match self.policy {
            BackwardPolicy::BoundedWait if backwards_ms <= self.tolerance_ms => {
                // The wait phase is recorded by the caller when it begins.
                Ok(Now::Backoff(Backoff::ClockBehind { backwards_ms }))
            }
            BackwardPolicy::Error | BackwardPolicy::BoundedWait => {
                if let Some(m) = &self.metrics {
                    m.record_clock_backward();
                }
                Err(Error::ClockMovedBackwards { backwards_ms })
            }
            BackwardPolicy::ReuseLastTimestamp => {
                if let Some(m) = &self.metrics {
                    m.record_clock_backward();
                }
                Ok(Now::At(state.last_timestamp))
            }
        }
    }

    /// Advances the watermark at the effective timestamp `now`, which is
    /// already `>= last_timestamp`.
    fn advance_at(&self, state: &mut SequenceState, now: i64) -> Result<Step, Error> {
        let delta = now - self.epoch_ms;
        if delta < 0 || delta > SnowflakeId::MAX_TIMESTAMP {
            return Err(Error::TimestampOverflow { delta_ms: delta });
        }
        if now == state.last_timestamp {
            if state.sequence >= SnowflakeId::MAX_SEQUENCE {
                // Never borrow sequence space from a future millisecond;
                // ordering requires waiting for the clock.
                return Ok(Step::Backoff(Backoff::SequenceExhausted));
            }
            state.sequence += 1;
        } else {
            state.last_timestamp = now;
            state.sequence = 0;
        }
        Ok(Step::Ready(SnowflakeId::from_components(
            delta,
            self.datacenter_id,
            self.worker_id,
            state.sequence,
        )))
    }

    /// Records the start of a wait phase.
    fn note_backoff(&self, backoff: Backoff) {
        if let Some(m) = &self.metrics {
            m.record_wait_started();
            match backoff {
                Backoff::SequenceExhausted => m.record_sequence_overflow(),
                Backoff::ClockBehind { .. } => m.record_clock_backward(),
            }
        }
        #[cfg(feature = "tracing")]
        match backoff {
            Backoff::SequenceExhausted => {
                tracing::debug!("sequence exhausted; waiting for the next millisecond");
            }
            Backoff::ClockBehind { backwards_ms } => {
                tracing::debug!(backwards_ms, "clock behind watermark; waiting it out");
            }
        }
    }

    /// Returns the elapsed wait when the configured stall limit is exceeded.
    fn stalled(&self, wait_started: Option<Instant>) -> Option<Duration> {
        let limit = self.stall_limit?;
        let waited = wait_started?.elapsed();
        (waited > limit).then_some(waited)
    }

    /// Closes out a wait phase, attributing its duration to the counters.
    fn finish_wait(&self, wait_started: Option<Instant>) {
        if let (Some(m), Some(started)) = (&self.metrics, wait_started) {
            m.record_wait_time(started.elapsed());
        }
    }

    fn fail_batch(
        &self,
        ids: Vec<SnowflakeId>,
        requested: usize,
        wait_started: Option<Instant>,
        source: Error,
    ) -> Result<Vec<SnowflakeId>, BatchError> {
        self.finish_wait(wait_started);
        Err(BatchError {
            ids,
            requested,
            source,
        })
    }
}
