/// What to do when the clock source reports a time behind the watermark.
///
/// Selected once at construction. A backward reading means the time source
/// is non-monotonic (e.g. an NTP step against [`WallClock`]); the policy
/// decides whether availability or timestamp fidelity wins.
///
/// [`WallClock`]: crate::WallClock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum BackwardPolicy {
    /// Fail every affected call with [`Error::ClockMovedBackwards`]. No
    /// identifier is issued. The default, and the safest choice.
    ///
    /// [`Error::ClockMovedBackwards`]: crate::Error::ClockMovedBackwards
    #[default]
    Error,

    /// If the regression is within the configured tolerance, sleep-poll
    /// until the clock catches back up to the watermark, bounded by a fixed
    /// retry count. Regressions beyond the tolerance, or waits that exhaust
    /// the retries, fail exactly as [`BackwardPolicy::Error`] does.
    BoundedWait,

    /// Substitute the watermark for the backward reading and keep issuing.
    ///
    /// UNSAFE in the uniqueness sense: encoded timestamps stop reflecting
    /// wall-clock reality, and a process restart inside the regressed window
    /// can repeat (timestamp, sequence) pairs. Only for deployments that
    /// prefer availability over correctness.
    ReuseLastTimestamp,
}

/// Whether the sequence-overflow wait holds the state lock.
///
/// When the 12-bit sequence fills up inside one millisecond, the generator
/// must wait for the clock to tick before it can issue again. The two ways
/// to wait are not equivalent, so the choice is an explicit construction
/// option rather than an implementation accident:
///
/// - [`HoldLock`]: the waiting caller keeps the lock. All other callers
///   queue behind it and the post-tick issue order is exactly the lock
///   acquisition order.
/// - [`ReleaseLock`]: the waiting caller drops the lock, sleeps, and
///   contends afresh. Other callers may observe the tick first and issue
///   before the original waiter.
///
/// Both preserve uniqueness and per-generator monotonicity; they differ only
/// in fairness and in how long unrelated callers can be held up.
///
/// [`HoldLock`]: WaitStrategy::HoldLock
/// [`ReleaseLock`]: WaitStrategy::ReleaseLock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Keep the lock while waiting for the next millisecond. The default:
    /// the wait resolves in under a millisecond, and first-come-first-served
    /// ordering is usually what callers expect.
    #[default]
    HoldLock,

    /// Release the lock while waiting and re-contend afterward.
    ReleaseLock,
}
