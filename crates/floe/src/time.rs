use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The epoch used by Twitter's original Snowflake deployment
/// (2010-11-04T01:42:54.657Z), in milliseconds since the Unix epoch.
pub const TWITTER_EPOCH_MS: i64 = 1_288_834_974_657;

/// The crate's default epoch (2020-01-01T00:00:00Z), in milliseconds since
/// the Unix epoch.
///
/// A recent epoch leaves the full 41-bit window (~69 years) ahead of it.
pub const DEFAULT_EPOCH_MS: i64 = 1_577_836_800_000;

/// A source of "current time in milliseconds since the Unix epoch".
///
/// The engine's only external dependency. Injectable so deterministic tests
/// can script time: a test clock is just a type returning values from a
/// `Cell` or atomic.
///
/// Implementations are not required to be monotonic; handling a reading that
/// goes backward is exactly what [`BackwardPolicy`] exists for.
///
/// [`BackwardPolicy`]: crate::BackwardPolicy
pub trait ClockSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// A monotonic clock anchored to the wall clock at construction.
///
/// Captures `Instant::now()` and the current `SystemTime` once, then reports
/// the anchored wall time plus monotonic elapsed time. Readings never go
/// backward, even when the system clock is adjusted (e.g. by NTP), which is
/// why this is the default clock for generators.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    start: Instant,
    /// Wall-clock milliseconds at `start`.
    anchor_ms: i64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Anchors a new monotonic clock to the current wall-clock time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock reads earlier than the Unix epoch.
    pub fn new() -> Self {
        let anchor = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX_EPOCH");
        Self {
            start: Instant::now(),
            anchor_ms: anchor.as_millis() as i64,
        }
    }
}

impl ClockSource for MonotonicClock {
    fn now_millis(&self) -> i64 {
        self.anchor_ms + self.start.elapsed().as_millis() as i64
    }
}

/// A clock that reads `SystemTime` on every call.
///
/// Unlike [`MonotonicClock`], readings CAN go backward when the operating
/// system steps the clock. Pair it with an explicit [`BackwardPolicy`] choice
/// when wall-clock-accurate timestamps matter more than immunity to clock
/// steps.
///
/// [`BackwardPolicy`]: crate::BackwardPolicy
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock;

impl ClockSource for WallClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        }
    }
}
