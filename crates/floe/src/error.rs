use crate::id::SnowflakeId;
use std::time::Duration;
use thiserror::Error;

/// Construction-time validation failures.
///
/// A generator whose configuration fails validation is never created; there
/// is no partially-initialized state to clean up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The datacenter ID does not fit the 5-bit field.
    #[error("datacenter id {0} out of range 0..={max}", max = SnowflakeId::MAX_DATACENTER_ID)]
    DatacenterIdOutOfRange(i64),

    /// The worker ID does not fit the 5-bit field.
    #[error("worker id {0} out of range 0..={max}", max = SnowflakeId::MAX_WORKER_ID)]
    WorkerIdOutOfRange(i64),

    /// The epoch predates the Unix epoch.
    #[error("epoch {0} ms predates the unix epoch")]
    EpochNegative(i64),

    /// The batch-size ceiling is zero, which would reject every batch.
    #[error("max batch size must be at least 1")]
    ZeroMaxBatchSize,
}

/// Runtime failures of the generation and decode paths.
///
/// All errors are returned to the immediate caller. The engine never logs,
/// panics, or retries on the caller's behalf, except for the bounded,
/// explicitly configured [`BackwardPolicy::BoundedWait`] loop.
///
/// [`BackwardPolicy::BoundedWait`]: crate::BackwardPolicy::BoundedWait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The clock source reported a time earlier than the last issued
    /// timestamp and the configured [`BackwardPolicy`] declined to absorb
    /// the regression.
    ///
    /// Recoverable: callers may retry later, alert, or reconstruct the
    /// generator with a more permissive policy.
    ///
    /// [`BackwardPolicy`]: crate::BackwardPolicy
    #[error("clock moved backwards by {backwards_ms} ms relative to the last issued timestamp")]
    ClockMovedBackwards {
        /// How far behind the watermark the clock reading was.
        backwards_ms: i64,
    },

    /// The millisecond delta since the configured epoch does not fit the
    /// 41-bit timestamp field.
    ///
    /// Fatal for the generator's remaining lifetime: the epoch is fixed, so
    /// once the window is exhausted no identifier can ever be produced
    /// again. Alert loudly; do not retry in a loop.
    #[error("timestamp delta {delta_ms} ms does not fit the 41-bit timestamp field")]
    TimestampOverflow {
        /// The out-of-window delta (negative when the clock is before the
        /// epoch).
        delta_ms: i64,
    },

    /// The clock failed to advance within the configured stall limit while
    /// waiting out a sequence overflow.
    ///
    /// Only possible when a stall limit is set; by default the wait is
    /// unbounded and expected to resolve within about one millisecond.
    #[error("clock failed to advance within {waited:?}")]
    ClockStalled {
        /// Total time spent waiting before giving up.
        waited: Duration,
    },

    /// The requested batch size is zero or exceeds the configured maximum.
    ///
    /// Rejected before any state mutation; no identifiers are consumed.
    #[error("batch size {requested} out of range 1..={max}")]
    InvalidBatchSize {
        /// The size the caller asked for.
        requested: usize,
        /// The generator's configured ceiling.
        max: usize,
    },

    /// The value failed structural or sanity-bound checks during decode.
    ///
    /// Purely a read-path error; no generator state is touched.
    #[error("invalid identifier {id}: {reason}")]
    InvalidId {
        /// The rejected raw value.
        id: i64,
        /// Which check failed.
        reason: &'static str,
    },
}

/// A batch that stopped early, carrying everything issued before the
/// failure.
///
/// Identifiers already emitted are valid and unique; whether to use the
/// partial slice or discard it is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("batch aborted after {issued} of {requested} ids: {source}", issued = ids.len())]
pub struct BatchError {
    /// Identifiers issued before the failure, in generation order.
    pub ids: Vec<SnowflakeId>,
    /// The batch size originally requested.
    pub requested: usize,
    /// The first error encountered.
    #[source]
    pub source: Error,
}
