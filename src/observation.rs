use crate::Timestamp;
use byteorder::{ByteOrder, LittleEndian};

/// Size of one buffered observation in bytes.
///
/// ```text
/// [0..8]   timestamp (i64, microseconds)
/// [8..16]  value     (f64)
/// ```
pub const ENTRY_SIZE: usize = 16;

/// Reserved timestamp meaning "no timestamp".
pub const TIMESTAMP_NULL: Timestamp = i64::MIN;

/// One `(timestamp, value)` data point contributing to a group's aggregate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Observation {
    /// Timestamp in microseconds
    pub ts: Timestamp,

    /// Observed value, `NaN` means "no value"
    pub value: f64,
}

impl Observation {
    /// Creates a new observation.
    #[must_use]
    pub const fn new(ts: Timestamp, value: f64) -> Self {
        Self { ts, value }
    }

    /// Returns `false` if the value is `NaN` or the timestamp is [`TIMESTAMP_NULL`].
    ///
    /// Invalid observations carry nothing usable for the step function and are skipped.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.value.is_nan() && self.ts != TIMESTAMP_NULL
    }

    /// Decodes an observation from the first [`ENTRY_SIZE`] bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`ENTRY_SIZE`].
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let (ts, value) = bytes.split_at(8);
        Self {
            ts: LittleEndian::read_i64(ts),
            value: LittleEndian::read_f64(value),
        }
    }

    /// Encodes the observation into the first [`ENTRY_SIZE`] bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`ENTRY_SIZE`].
    pub fn encode_into(&self, bytes: &mut [u8]) {
        let (ts, value) = bytes.split_at_mut(8);
        LittleEndian::write_i64(ts, self.ts);
        LittleEndian::write_f64(value, self.value);
    }

    /// Reads only the timestamp of an encoded entry.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than 8 bytes.
    #[must_use]
    pub fn decode_ts(bytes: &[u8]) -> Timestamp {
        LittleEndian::read_i64(bytes)
    }
}
