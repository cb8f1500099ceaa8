use super::buffer::Buffer;
use crate::{Arena, BufferHandle, Observation, Timestamp};

/// Remembers the value computed for the most recently read buffer.
///
/// Keyed by handle and count: every merge and every growth replaces the
/// handle, and an append in place changes the count.
#[derive(Copy, Clone, Debug, Default)]
pub struct ResultCache {
    key: Option<(BufferHandle, usize)>,
    value: f64,
}

impl ResultCache {
    pub fn get(&self, buf: &Buffer) -> Option<f64> {
        let ptr = buf.ptr?;
        (self.key == Some((ptr, buf.count))).then_some(self.value)
    }

    pub fn put(&mut self, buf: &Buffer, value: f64) {
        self.key = buf.ptr.map(|ptr| (ptr, buf.count));
        self.value = value;
    }

    pub fn clear(&mut self) {
        self.key = None;
    }
}

/// Time between two timestamps.
///
/// Taken in floating point: the span between two valid timestamps can exceed `i64`.
#[allow(clippy::cast_precision_loss)]
fn duration(from: Timestamp, to: Timestamp) -> f64 {
    to as f64 - from as f64
}

/// Integrates the step function over observations sorted by timestamp.
///
/// Each value is weighted by the time until the next observation. When all
/// observations share one timestamp, the arithmetic mean is returned instead.
/// No observations yield `NaN`.
#[allow(clippy::cast_precision_loss)]
pub fn integrate(mut observations: impl Iterator<Item = Observation>) -> f64 {
    let Some(first) = observations.next() else {
        return f64::NAN;
    };

    let mut prev = first;
    let mut count = 1usize;
    let mut weighted_sum = 0.0;
    let mut value_sum = first.value;

    for curr in observations {
        weighted_sum += prev.value * duration(prev.ts, curr.ts);
        value_sum += curr.value;
        count += 1;
        prev = curr;
    }

    if count == 1 {
        return first.value;
    }

    let total_duration = duration(first.ts, prev.ts);

    if total_duration > 0.0 {
        weighted_sum / total_duration
    } else {
        // NOTE: All observations at the same timestamp
        value_sum / count as f64
    }
}

/// Computes the TWAP of a fully merged buffer.
pub fn compute(buf: &Buffer, arena: &Arena) -> f64 {
    integrate(buf.iter(arena))
}
