use super::{BackwardPolicy, Generator, SequenceState, WaitStrategy};
use crate::error::ConfigError;
use crate::id::SnowflakeId;
use crate::metrics::MetricsRecorder;
use crate::time::{ClockSource, DEFAULT_EPOCH_MS, MonotonicClock};
use parking_lot::Mutex;
use std::time::Duration;

pub(super) const DEFAULT_BACKWARD_TOLERANCE_MS: i64 = 5;
pub(super) const DEFAULT_BACKWARD_RETRIES: u32 = 16;
pub(super) const DEFAULT_MAX_BATCH_SIZE: usize = 4096;

/// Configures and constructs a [`Generator`].
///
/// Every optional field has exactly one default, so construction is total:
/// any builder that passes ID validation produces a fully-specified
/// generator.
///
/// | Option | Default |
/// |---|---|
/// | epoch | [`DEFAULT_EPOCH_MS`] (2020-01-01T00:00:00Z) |
/// | clock | [`MonotonicClock`] |
/// | backward policy | [`BackwardPolicy::Error`] |
/// | backward tolerance | 5 ms |
/// | backward retries | 16 |
/// | wait strategy | [`WaitStrategy::HoldLock`] |
/// | max batch size | 4096 |
/// | stall limit | none (wait forever for the clock to tick) |
/// | metrics | disabled |
///
/// # Example
///
/// ```
/// use floe::{BackwardPolicy, Generator, WallClock};
/// use std::time::Duration;
///
/// let generator = Generator::builder(3, 7)
///     .clock(WallClock)
///     .backward_policy(BackwardPolicy::BoundedWait)
///     .backward_tolerance(Duration::from_millis(10))
///     .metrics(true)
///     .build()
///     .unwrap();
/// assert_eq!(generator.datacenter_id(), 3);
/// ```
#[derive(Debug)]
pub struct GeneratorBuilder<C = MonotonicClock> {
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
    metrics: bool,
}

impl GeneratorBuilder<MonotonicClock> {
    pub(super) fn new(datacenter_id: i64, worker_id: i64) -> Self {
        Self {
            datacenter_id,
            worker_id,
            epoch_ms: DEFAULT_EPOCH_MS,
            clock: MonotonicClock::new(),
            policy: BackwardPolicy::default(),
            tolerance_ms: DEFAULT_BACKWARD_TOLERANCE_MS,
            backward_retries: DEFAULT_BACKWARD_RETRIES,
            wait: WaitStrategy::default(),
            max_batch: DEFAULT_MAX_BATCH_SIZE,
            stall_limit: None,
            metrics: false,
        }
    }
}

impl<C: ClockSource> GeneratorBuilder<C> {
    /// Sets the epoch, in milliseconds since the Unix epoch, from which the
    /// 41-bit timestamp field is measured.
    pub fn epoch_millis(mut self, epoch_ms: i64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    /// Replaces the clock source. Tests inject scripted clocks here.
    pub fn clock<D: ClockSource>(self, clock: D) -> GeneratorBuilder<D> {
        GeneratorBuilder {
            datacenter_id: self.datacenter_id,
            worker_id: self.worker_id,
            epoch_ms: self.epoch_ms,
            clock,
            policy: self.policy,
            tolerance_ms: self.tolerance_ms,
            backward_retries: self.backward_retries,
            wait: self.wait,
            max_batch: self.max_batch,
            stall_limit: self.stall_limit,
            metrics: self.metrics,
        }
    }

    /// Selects the [`BackwardPolicy`] applied when the clock reads behind
    /// the watermark.
    pub fn backward_policy(mut self, policy: BackwardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets how large a backward regression [`BackwardPolicy::BoundedWait`]
    /// is willing to wait out. Regressions beyond this fail immediately.
    pub fn backward_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance_ms = tolerance.as_millis() as i64;
        self
    }

    /// Sets how many sleep-poll attempts [`BackwardPolicy::BoundedWait`]
    /// makes before giving up.
    pub fn backward_retries(mut self, retries: u32) -> Self {
        self.backward_retries = retries;
        self
    }

    /// Chooses whether the sequence-overflow wait holds or releases the
    /// state lock. See [`WaitStrategy`] for the trade-off.
    pub fn wait_strategy(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the largest batch [`Generator::next_id_batch`] accepts.
    pub fn max_batch_size(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Bounds the otherwise-unbounded sequence-overflow wait.
    ///
    /// If the clock fails to advance within `limit`, the waiting call fails
    /// with [`Error::ClockStalled`] instead of blocking forever. Intended
    /// for defensive testing against frozen clocks.
    ///
    /// [`Error::ClockStalled`]: crate::Error::ClockStalled
    pub fn stall_limit(mut self, limit: Duration) -> Self {
        self.stall_limit = Some(limit);
        self
    }

    /// Enables or disables the atomic [`metrics`] counters.
    ///
    /// [`metrics`]: Generator::metrics
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Validates the configuration and constructs the generator.
    ///
    /// # Errors
    ///
    /// Fails closed on a datacenter or worker ID outside `0..=31`, a
    /// negative epoch, or a zero batch-size ceiling.
    pub fn build(self) -> Result<Generator<C>, ConfigError> {
        if self.datacenter_id < 0 || self.datacenter_id > SnowflakeId::MAX_DATACENTER_ID {
            return Err(ConfigError::DatacenterIdOutOfRange(self.datacenter_id));
        }
        if self.worker_id < 0 || self.worker_id > SnowflakeId::MAX_WORKER_ID {
            return Err(ConfigError::WorkerIdOutOfRange(self.worker_id));
        }
        if self.epoch_ms < 0 {
            return Err(ConfigError::EpochNegative(self.epoch_ms));
        }
        if self.max_batch == 0 {
            return Err(ConfigError::ZeroMaxBatchSize);
        }

        Ok(Generator {
            datacenter_id: self.datacenter_id,
            worker_id: self.worker_id,
            epoch_ms: self.epoch_ms,
            clock: self.clock,
            policy: self.policy,
            tolerance_ms: self.tolerance_ms,
            backward_retries: self.backward_retries,
            wait: self.wait,
            max_batch: self.max_batch,
            stall_limit: self.stall_limit,
            metrics: self.metrics.then(MetricsRecorder::default),
            state: Mutex::new(SequenceState::new()),
        })
    }
}
