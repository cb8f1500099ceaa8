pub(crate) mod twap;

use crate::{Arena, MapValue, Record, ValueTypes};

/// Fill policies a function supports when the time-bucketing layer
/// has to synthesize a value for an empty bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleByFill(u8);

impl SampleByFill {
    /// Leave empty buckets out.
    pub const NONE: Self = Self(1);

    /// Fill with null.
    pub const NULL: Self = Self(1 << 1);

    /// Carry the last known value forward.
    pub const PREV: Self = Self(1 << 2);

    /// Interpolate between neighbours.
    pub const LINEAR: Self = Self(1 << 3);

    /// Fill with a constant.
    pub const VALUE: Self = Self(1 << 4);

    /// Every fill policy; the function holds a value that can be filled in any way.
    pub const ALL: Self = Self(Self::NONE.0 | Self::NULL.0 | Self::PREV.0 | Self::LINEAR.0 | Self::VALUE.0);

    /// Returns `true` if every policy in `other` is supported.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SampleByFill {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Contract between an aggregate function and the GROUP BY engine driving it.
///
/// The engine owns one [`MapValue`] per group key and hands it to the function
/// for every row routed to that group. A function addresses its own slots
/// starting at its value index.
///
/// Parallel execution runs in two phases: every worker accumulates partial
/// records with its own function instance (and that instance's [`Arena`]),
/// then partial records of the same key are merged pairwise into one.
pub trait GroupByFunction: Send {
    /// Function name, as written in queries.
    fn name(&self) -> &'static str;

    /// Registers the value columns this function needs and remembers where they start.
    fn init_value_types(&mut self, types: &mut ValueTypes);

    /// Overrides the index of the first value column.
    fn init_value_index(&mut self, idx: usize);

    /// Index of the first value column.
    fn value_index(&self) -> usize;

    /// Hands the function the arena all of its buffers are allocated in.
    fn set_allocator(&mut self, arena: Arena);

    /// Arena currently backing this function's buffers.
    fn allocator(&self) -> &Arena;

    /// Called for the first row of a group seen by this instance.
    fn compute_first(&mut self, value: &mut MapValue, rec: &dyn Record);

    /// Called for every further row of a group.
    fn compute_next(&mut self, value: &mut MapValue, rec: &dyn Record);

    /// Folds the partial record `src` (backed by `src_arena`) into `dest`.
    ///
    /// `dest` must be backed by this function's own arena.
    fn merge(&mut self, dest: &mut MapValue, src: &MapValue, src_arena: &Arena);

    /// Writes the empty state.
    fn set_null(&mut self, value: &mut MapValue);

    /// Reads the final value of a fully merged record, `NaN` meaning no value.
    fn get_f64(&mut self, value: &MapValue) -> f64;

    /// Whether partial records of this function can be merged.
    fn supports_parallelism(&self) -> bool {
        false
    }

    /// Whether one instance may be shared between workers.
    fn is_thread_safe(&self) -> bool {
        false
    }

    /// Whether the function ignores its input.
    fn is_constant(&self) -> bool {
        false
    }

    /// Fill policies supported for empty time buckets.
    fn sample_by_flags(&self) -> SampleByFill {
        SampleByFill::NONE
    }
}

/// Creates fresh function instances, one per worker.
pub trait GroupByFunctionFactory: Send + Sync {
    /// Creates a new, unconfigured function instance.
    fn new_instance(&self) -> Box<dyn GroupByFunction>;
}
