use crate::error::Error;
use core::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Twitter-Snowflake-style 64-bit identifier.
///
/// The ID is packed from **MSB to LSB** into a signed 64-bit integer whose
/// sign bit is always zero:
///
/// ```text
///  Bit Index:  high bits                                      low bits
///              +---+----------------+---------+--------+---------------+
///  Field:      | 0 | timestamp (41) | dc (5)  | wk (5) | sequence (12) |
///              +---+----------------+---------+--------+---------------+
///              |<------------- MSB ---- 64 bits ---- LSB ------------->|
/// ```
///
/// - `timestamp`: milliseconds elapsed since a fixed epoch
/// - `dc`: datacenter ID (0..=31)
/// - `wk`: worker ID (0..=31)
/// - `sequence`: per-millisecond counter (0..=4095)
///
/// IDs generated by one [`Generator`] for a fixed (datacenter, worker) pair
/// under a non-decreasing clock are strictly increasing and never repeat.
///
/// [`Generator`]: crate::Generator
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SnowflakeId {
    id: i64,
}

const _: () = {
    // The sign bit plus all four fields must account for every bit of i64.
    assert!(
        1 + SnowflakeId::TIMESTAMP_BITS
            + SnowflakeId::DATACENTER_ID_BITS
            + SnowflakeId::WORKER_ID_BITS
            + SnowflakeId::SEQUENCE_BITS
            == i64::BITS,
        "Snowflake layout must cover exactly 63 value bits"
    );
};

impl SnowflakeId {
    pub const TIMESTAMP_BITS: u32 = 41;
    pub const DATACENTER_ID_BITS: u32 = 5;
    pub const WORKER_ID_BITS: u32 = 5;
    pub const SEQUENCE_BITS: u32 = 12;

    pub const SEQUENCE_SHIFT: u32 = 0;
    pub const WORKER_ID_SHIFT: u32 = Self::SEQUENCE_BITS;
    pub const DATACENTER_ID_SHIFT: u32 = Self::WORKER_ID_SHIFT + Self::WORKER_ID_BITS;
    pub const TIMESTAMP_SHIFT: u32 = Self::DATACENTER_ID_SHIFT + Self::DATACENTER_ID_BITS;

    pub const MAX_TIMESTAMP: i64 = (1 << Self::TIMESTAMP_BITS) - 1;
    pub const MAX_DATACENTER_ID: i64 = (1 << Self::DATACENTER_ID_BITS) - 1;
    pub const MAX_WORKER_ID: i64 = (1 << Self::WORKER_ID_BITS) - 1;
    pub const MAX_SEQUENCE: i64 = (1 << Self::SEQUENCE_BITS) - 1;

    /// Packs the four field values into an ID.
    ///
    /// All inputs must already be within their field ranges; the generator
    /// enforces this before packing. Out-of-range values would alias
    /// neighboring fields, so they are rejected in debug builds.
    pub(crate) const fn from_components(
        timestamp: i64,
        datacenter_id: i64,
        worker_id: i64,
        sequence: i64,
    ) -> Self {
        debug_assert!(timestamp >= 0 && timestamp <= Self::MAX_TIMESTAMP);
        debug_assert!(datacenter_id >= 0 && datacenter_id <= Self::MAX_DATACENTER_ID);
        debug_assert!(worker_id >= 0 && worker_id <= Self::MAX_WORKER_ID);
        debug_assert!(sequence >= 0 && sequence <= Self::MAX_SEQUENCE);

        Self {
            id: (timestamp << Self::TIMESTAMP_SHIFT)
                | (datacenter_id << Self::DATACENTER_ID_SHIFT)
                | (worker_id << Self::WORKER_ID_SHIFT)
                | sequence,
        }
    }

    /// Returns the timestamp field: milliseconds since the generator's epoch.
    #[inline]
    pub const fn timestamp(&self) -> i64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::MAX_TIMESTAMP
    }

    /// Returns the datacenter ID field.
    #[inline]
    pub const fn datacenter_id(&self) -> i64 {
        (self.id >> Self::DATACENTER_ID_SHIFT) & Self::MAX_DATACENTER_ID
    }

    /// Returns the worker ID field.
    #[inline]
    pub const fn worker_id(&self) -> i64 {
        (self.id >> Self::WORKER_ID_SHIFT) & Self::MAX_WORKER_ID
    }

    /// Returns the sequence field.
    #[inline]
    pub const fn sequence(&self) -> i64 {
        self.id & Self::MAX_SEQUENCE
    }

    /// Converts this ID into its raw `i64` representation.
    #[inline]
    pub const fn to_raw(&self) -> i64 {
        self.id
    }

    /// Reinterprets a raw `i64` as an ID without validation.
    ///
    /// Use [`DecodedInfo::decode`] or [`Generator::parse`] when the input is
    /// untrusted.
    ///
    /// [`Generator::parse`]: crate::Generator::parse
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self { id: raw }
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl From<SnowflakeId> for i64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

/// The four fields recovered from an identifier, plus the reconstructed
/// absolute timestamp.
///
/// A read-only projection: decoding never touches generator state, and every
/// call allocates a fresh value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DecodedInfo {
    /// Milliseconds since the epoch the ID was generated against.
    pub timestamp_delta: i64,
    /// Absolute timestamp in milliseconds since the Unix epoch
    /// (`epoch + timestamp_delta`).
    pub timestamp_millis: i64,
    /// Datacenter ID encoded in the identifier.
    pub datacenter_id: i64,
    /// Worker ID encoded in the identifier.
    pub worker_id: i64,
    /// Per-millisecond sequence number.
    pub sequence: i64,
}

impl DecodedInfo {
    /// Decodes a raw identifier against the given epoch (milliseconds since
    /// the Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if `id` is zero or negative. The sign
    /// bit of an issued ID is always clear, and with any realistic (past)
    /// epoch the timestamp field is nonzero, so neither value can be a
    /// legitimate identifier.
    pub fn decode(id: i64, epoch_millis: i64) -> Result<Self, Error> {
        if id <= 0 {
            return Err(Error::InvalidId {
                id,
                reason: "identifier must be positive",
            });
        }
        let id = SnowflakeId::from_raw(id);
        let timestamp_delta = id.timestamp();
        Ok(Self {
            timestamp_delta,
            timestamp_millis: epoch_millis + timestamp_delta,
            datacenter_id: id.datacenter_id(),
            worker_id: id.worker_id(),
            sequence: id.sequence(),
        })
    }

    /// The absolute timestamp as a [`SystemTime`].
    pub fn timestamp(&self) -> SystemTime {
        if self.timestamp_millis >= 0 {
            UNIX_EPOCH + Duration::from_millis(self.timestamp_millis as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(self.timestamp_millis.unsigned_abs())
        }
    }
}
