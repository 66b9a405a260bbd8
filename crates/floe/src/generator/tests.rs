use super::*;
use crate::error::ConfigError;
use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Mutex;
use std::thread::scope;

struct FixedTime(i64);

impl ClockSource for FixedTime {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Returns scripted readings in order, holding the final reading forever.
struct StepTime {
    values: Vec<i64>,
    index: Cell<usize>,
}

impl StepTime {
    fn new(values: Vec<i64>) -> Self {
        assert!(!values.is_empty());
        Self {
            values,
            index: Cell::new(0),
        }
    }
}

impl ClockSource for StepTime {
    fn now_millis(&self) -> i64 {
        let i = self.index.get();
        if i + 1 < self.values.len() {
            self.index.set(i + 1);
        }
        self.values[i]
    }
}

fn generator_at<C: ClockSource>(clock: C) -> GeneratorBuilder<C> {
    Generator::builder(1, 2).epoch_millis(0).clock(clock)
}

#[test]
fn sequence_increments_within_same_millisecond() {
    let generator = generator_at(FixedTime(42)).build().unwrap();

    let a = generator.next_id().unwrap();
    let b = generator.next_id().unwrap();
    let c = generator.next_id().unwrap();

    assert_eq!(a.timestamp(), 42);
    assert_eq!(b.timestamp(), 42);
    assert_eq!(c.timestamp(), 42);
    assert_eq!(a.sequence(), 0);
    assert_eq!(b.sequence(), 1);
    assert_eq!(c.sequence(), 2);
    assert!(a < b && b < c);
}

#[test]
fn new_millisecond_resets_sequence() {
    let generator = generator_at(StepTime::new(vec![5, 5, 6])).build().unwrap();

    let a = generator.next_id().unwrap();
    let b = generator.next_id().unwrap();
    let c = generator.next_id().unwrap();

    assert_eq!((a.timestamp(), a.sequence()), (5, 0));
    assert_eq!((b.timestamp(), b.sequence()), (5, 1));
    assert_eq!((c.timestamp(), c.sequence()), (6, 0));
}

#[test]
fn identity_is_encoded_in_every_id() {
    let generator = Generator::builder(3, 7)
        .epoch_millis(0)
        .clock(FixedTime(42))
        .build()
        .unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(id.datacenter_id(), 3);
    assert_eq!(id.worker_id(), 7);
}

#[test]
fn sequence_wraparound_waits_for_next_millisecond() {
    // 4096 reads of tick 42 fill the sequence space; the 4097th call sees
    // the exhausted tick once, waits, and lands on tick 43 with sequence 0.
    let mut script = vec![42; 4097];
    script.push(43);
    let generator = generator_at(StepTime::new(script)).build().unwrap();

    let mut last = None;
    for i in 0..4096 {
        let id = generator.next_id().unwrap();
        assert_eq!(id.timestamp(), 42);
        assert_eq!(id.sequence(), i);
        last = Some(id);
    }

    let next = generator.next_id().unwrap();
    assert_eq!(next.timestamp(), 43);
    assert_eq!(next.sequence(), 0);
    assert!(next > last.unwrap());
}

#[test]
fn release_lock_strategy_waits_the_same_way() {
    let mut script = vec![42; 4097];
    script.push(43);
    let generator = generator_at(StepTime::new(script))
        .wait_strategy(WaitStrategy::ReleaseLock)
        .build()
        .unwrap();

    for _ in 0..4096 {
        generator.next_id().unwrap();
    }
    let next = generator.next_id().unwrap();
    assert_eq!(next.timestamp(), 43);
    assert_eq!(next.sequence(), 0);
}

#[test]
fn stall_limit_bounds_the_sequence_wait() {
    let generator = generator_at(FixedTime(42))
        .stall_limit(Duration::from_millis(5))
        .build()
        .unwrap();

    for _ in 0..4096 {
        generator.next_id().unwrap();
    }
    // The clock never advances, so the wait gives up at the limit instead
    // of skipping ahead in sequence space.
    match generator.next_id() {
        Err(Error::ClockStalled { waited }) => assert!(waited >= Duration::from_millis(5)),
        other => panic!("expected ClockStalled, got {other:?}"),
    }
}

#[test]
fn error_policy_rejects_backward_clock() {
    let generator = generator_at(StepTime::new(vec![100, 90])).build().unwrap();

    let first = generator.next_id().unwrap();
    assert_eq!(first.timestamp(), 100);

    assert_eq!(
        generator.next_id(),
        Err(Error::ClockMovedBackwards { backwards_ms: 10 })
    );
}

#[test]
fn bounded_wait_recovers_within_tolerance() {
    let generator = generator_at(StepTime::new(vec![100, 99, 100]))
        .backward_policy(BackwardPolicy::BoundedWait)
        .build()
        .unwrap();

    let first = generator.next_id().unwrap();
    assert_eq!((first.timestamp(), first.sequence()), (100, 0));

    // Second call reads 99, waits, re-reads 100 and proceeds in sequence.
    let second = generator.next_id().unwrap();
    assert_eq!((second.timestamp(), second.sequence()), (100, 1));
}

#[test]
fn bounded_wait_rejects_beyond_tolerance() {
    let generator = generator_at(StepTime::new(vec![100, 80]))
        .backward_policy(BackwardPolicy::BoundedWait)
        .backward_tolerance(Duration::from_millis(5))
        .build()
        .unwrap();

    generator.next_id().unwrap();
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockMovedBackwards { backwards_ms: 20 })
    );
}

#[test]
fn bounded_wait_gives_up_after_retries() {
    // The scripted clock stays behind forever; the retry budget has to
    // terminate the wait.
    let generator = generator_at(StepTime::new(vec![100, 99]))
        .backward_policy(BackwardPolicy::BoundedWait)
        .backward_retries(2)
        .build()
        .unwrap();

    generator.next_id().unwrap();
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockMovedBackwards { backwards_ms: 1 })
    );
}

#[test]
fn reuse_policy_substitutes_the_watermark() {
    let generator = generator_at(StepTime::new(vec![100, 90]))
        .backward_policy(BackwardPolicy::ReuseLastTimestamp)
        .build()
        .unwrap();

    let first = generator.next_id().unwrap();
    let second = generator.next_id().unwrap();
    assert_eq!((first.timestamp(), first.sequence()), (100, 0));
    assert_eq!((second.timestamp(), second.sequence()), (100, 1));
    assert!(second > first);
}

#[test]
fn construction_rejects_out_of_range_ids() {
    assert_eq!(
        Generator::new(-1, 0).err(),
        Some(ConfigError::DatacenterIdOutOfRange(-1))
    );
    assert_eq!(
        Generator::new(32, 0).err(),
        Some(ConfigError::DatacenterIdOutOfRange(32))
    );
    assert_eq!(
        Generator::new(0, -1).err(),
        Some(ConfigError::WorkerIdOutOfRange(-1))
    );
    assert_eq!(
        Generator::new(0, 32).err(),
        Some(ConfigError::WorkerIdOutOfRange(32))
    );
    assert!(Generator::new(31, 31).is_ok());
}

#[test]
fn construction_rejects_degenerate_options() {
    assert_eq!(
        Generator::builder(0, 0).epoch_millis(-1).build().err(),
        Some(ConfigError::EpochNegative(-1))
    );
    assert_eq!(
        Generator::builder(0, 0).max_batch_size(0).build().err(),
        Some(ConfigError::ZeroMaxBatchSize)
    );
}

#[test]
fn epoch_ahead_of_clock_is_a_timestamp_overflow() {
    let generator = Generator::builder(1, 2)
        .epoch_millis(100)
        .clock(FixedTime(50))
        .build()
        .unwrap();

    assert_eq!(
        generator.next_id(),
        Err(Error::TimestampOverflow { delta_ms: -50 })
    );
}

#[test]
fn exhausted_timestamp_window_is_fatal() {
    let beyond = SnowflakeId::MAX_TIMESTAMP + 1;
    let generator = generator_at(FixedTime(beyond)).build().unwrap();

    assert_eq!(
        generator.next_id(),
        Err(Error::TimestampOverflow { delta_ms: beyond })
    );
    // Nothing recovers the window; subsequent calls fail identically.
    assert_eq!(
        generator.next_id(),
        Err(Error::TimestampOverflow { delta_ms: beyond })
    );
}

#[test]
fn batch_size_is_validated_before_any_mutation() {
    let generator = generator_at(FixedTime(42)).build().unwrap();

    let err = generator.next_id_batch(0).unwrap_err();
    assert!(err.ids.is_empty());
    assert_eq!(
        err.source,
        Error::InvalidBatchSize {
            requested: 0,
            max: 4096
        }
    );

    let err = generator.next_id_batch(4097).unwrap_err();
    assert!(err.ids.is_empty());
    assert_eq!(
        err.source,
        Error::InvalidBatchSize {
            requested: 4097,
            max: 4096
        }
    );

    // The rejected calls consumed no sequence slots.
    assert_eq!(generator.next_id().unwrap().sequence(), 0);
}

#[test]
fn batch_matches_sequential_generation() {
    let batched = generator_at(FixedTime(7)).build().unwrap();
    let sequential = generator_at(FixedTime(7)).build().unwrap();

    let batch = batched.next_id_batch(100).unwrap();
    let singles: Vec<_> = (0..100).map(|_| sequential.next_id().unwrap()).collect();

    assert_eq!(batch.len(), 100);
    assert_eq!(batch, singles);

    let unique: HashSet<i64> = batch.iter().map(|id| id.to_raw()).collect();
    assert_eq!(unique.len(), 100);
}

#[test]
fn batch_crosses_millisecond_boundaries() {
    // One clock read covers each millisecond: 4096 ids at tick 7, the
    // remainder at tick 8.
    let generator = generator_at(StepTime::new(vec![7, 8]))
        .max_batch_size(8192)
        .build()
        .unwrap();

    let ids = generator.next_id_batch(4100).unwrap();
    assert_eq!(ids.len(), 4100);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids[4095].timestamp(), 7);
    assert_eq!(ids[4095].sequence(), 4095);
    assert_eq!(ids[4096].timestamp(), 8);
    assert_eq!(ids[4096].sequence(), 0);
}

#[test]
fn batch_returns_partial_results_on_backward_clock() {
    let generator = generator_at(StepTime::new(vec![7, 5]))
        .max_batch_size(8192)
        .build()
        .unwrap();

    let err = generator.next_id_batch(4100).unwrap_err();
    assert_eq!(err.ids.len(), 4096);
    assert_eq!(err.requested, 4100);
    assert_eq!(err.source, Error::ClockMovedBackwards { backwards_ms: 2 });
    assert!(err.ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn batch_returns_partial_results_on_timestamp_overflow() {
    let beyond = SnowflakeId::MAX_TIMESTAMP + 1;
    let generator = generator_at(StepTime::new(vec![7, beyond]))
        .max_batch_size(8192)
        .build()
        .unwrap();

    let err = generator.next_id_batch(4100).unwrap_err();
    assert_eq!(err.ids.len(), 4096);
    assert_eq!(err.source, Error::TimestampOverflow { delta_ms: beyond });
}

#[test]
fn parse_recovers_the_configured_identity() {
    let generator = Generator::builder(3, 7)
        .epoch_millis(1_000)
        .clock(FixedTime(1_042))
        .build()
        .unwrap();

    let id = generator.next_id().unwrap();
    let info = generator.parse(id.to_raw()).unwrap();
    assert_eq!(info.datacenter_id, 3);
    assert_eq!(info.worker_id, 7);
    assert_eq!(info.timestamp_delta, 42);
    assert_eq!(info.timestamp_millis, 1_042);
    assert_eq!(info.sequence, 0);

    assert!(matches!(
        generator.parse(0),
        Err(Error::InvalidId { id: 0, .. })
    ));
    assert!(matches!(
        generator.parse(-1),
        Err(Error::InvalidId { id: -1, .. })
    ));
}

#[test]
fn validate_applies_the_forward_skew_bound() {
    let now = 1_000_000;
    let generator = generator_at(FixedTime(now)).build().unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(generator.validate(id.to_raw()), Ok(()));

    // Slight forward skew is tolerated.
    let near = SnowflakeId::from_components(now + 100, 1, 2, 0);
    assert_eq!(generator.validate(near.to_raw()), Ok(()));

    // A timestamp past the tolerance window is rejected as malformed.
    let far = SnowflakeId::from_components(now + FORWARD_SKEW_TOLERANCE_MS + 1, 1, 2, 0);
    assert!(matches!(
        generator.validate(far.to_raw()),
        Err(Error::InvalidId { .. })
    ));
}

#[test]
fn ids_are_strictly_monotonic_under_a_forward_clock() {
    let generator = Generator::new(1, 1).unwrap();

    let mut last = generator.next_id().unwrap();
    for _ in 0..10_000 {
        let id = generator.next_id().unwrap();
        assert!(id > last);
        last = id;
    }
}

#[test]
fn ids_are_unique_under_concurrency() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 4_096;

    let generator = Generator::new(1, 2).unwrap();
    let seen = Mutex::new(HashSet::with_capacity(THREADS * IDS_PER_THREAD));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..IDS_PER_THREAD {
                    let id = generator.next_id().unwrap();
                    assert!(seen.lock().unwrap().insert(id.to_raw()));
                }
            });
        }
    });

    assert_eq!(seen.into_inner().unwrap().len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn metrics_observe_generation_and_waits() {
    let generator = generator_at(FixedTime(42))
        .metrics(true)
        .stall_limit(Duration::from_millis(2))
        .build()
        .unwrap();

    for _ in 0..4096 {
        generator.next_id().unwrap();
    }
    let snap = generator.metrics().unwrap();
    assert_eq!(snap.ids, 4096);
    assert_eq!(snap.sequence_overflows, 0);
    assert_eq!(snap.waits, 0);

    // Frozen clock: the next call enters a wait and stalls out.
    assert!(matches!(
        generator.next_id(),
        Err(Error::ClockStalled { .. })
    ));
    let snap = generator.metrics().unwrap();
    assert_eq!(snap.ids, 4096);
    assert_eq!(snap.sequence_overflows, 1);
    assert_eq!(snap.waits, 1);
    assert!(snap.total_wait >= Duration::from_millis(2));
    assert_eq!(snap.clock_backwards, 0);
}

#[test]
fn metrics_count_backward_clock_events() {
    let generator = generator_at(StepTime::new(vec![100, 90]))
        .metrics(true)
        .build()
        .unwrap();

    generator.next_id().unwrap();
    assert!(generator.next_id().is_err());

    let snap = generator.metrics().unwrap();
    assert_eq!(snap.ids, 1);
    assert_eq!(snap.clock_backwards, 1);
}

#[test]
fn metrics_are_absent_unless_enabled() {
    let generator = generator_at(FixedTime(42)).build().unwrap();
    generator.next_id().unwrap();
    assert!(generator.metrics().is_none());
}
