//! Process-local, globally-distinguishable 64-bit identifiers.
//!
//! `floe` packs a timestamp, a datacenter ID, a worker ID, and a
//! per-millisecond sequence counter into one signed 64-bit integer, in the
//! style of Twitter's Snowflake. Many concurrent callers within one process
//! receive strictly unique, densely packed, roughly time-ordered IDs; many
//! processes stay mutually unique by configuration, each running with a
//! distinct (datacenter, worker) pair.
//!
//! # Quick start
//!
//! ```
//! use floe::Generator;
//!
//! let generator = Generator::new(0, 0).unwrap();
//!
//! let id = generator.next_id().unwrap();
//! let batch = generator.next_id_batch(100).unwrap();
//! assert_eq!(batch.len(), 100);
//! assert!(batch[0] > id);
//!
//! let info = generator.parse(id.to_raw()).unwrap();
//! assert_eq!(info.sequence, id.sequence());
//! ```
//!
//! # Clocks that move backward
//!
//! The default [`MonotonicClock`] never goes backward. When a generator runs
//! against a non-monotonic source (such as [`WallClock`] under NTP steps),
//! the construction-time [`BackwardPolicy`] decides whether affected calls
//! fail, wait the regression out, or reuse the watermark timestamp.
//!
//! # Concurrency
//!
//! A generator's only shared mutable state is its sequence watermark behind
//! a single mutex; all ID-producing operations are linearized by that lock.
//! Distinct generator instances share nothing.
//!
//! # Feature flags
//!
//! - `tracing`: trace-level spans on the generation paths and debug events
//!   when a call has to wait.

mod error;
mod generator;
mod id;
mod metrics;
mod time;

pub use crate::error::{BatchError, ConfigError, Error};
pub use crate::generator::{
    BackwardPolicy, FORWARD_SKEW_TOLERANCE_MS, Generator, GeneratorBuilder, WaitStrategy,
};
pub use crate::id::{DecodedInfo, SnowflakeId};
pub use crate::metrics::MetricsSnapshot;
pub use crate::time::{
    ClockSource, DEFAULT_EPOCH_MS, MonotonicClock, TWITTER_EPOCH_MS, WallClock,
};
