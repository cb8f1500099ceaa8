/// Type of one aggregate value column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColumnType {
    /// 64-bit signed integer
    Long,
}

/// Registry of value columns making up one group's aggregate record.
///
/// Every aggregate function appends the columns it needs and remembers
/// where its own columns start.
#[derive(Clone, Debug, Default)]
pub struct ValueTypes(Vec<ColumnType>);

impl ValueTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn add(&mut self, ty: ColumnType) {
        self.0.push(ty);
    }

    /// Number of columns registered so far.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.0.len()
    }

    /// Type of the column at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<ColumnType> {
        self.0.get(idx).copied()
    }

    /// Allocates a zeroed record with one slot per registered column.
    #[must_use]
    pub fn new_value(&self) -> MapValue {
        MapValue(vec![0; self.0.len()].into_boxed_slice())
    }
}

/// Fixed-width per-group record of 64-bit slots.
///
/// Several aggregate functions share one record, each addressing its
/// own slots through the value index it was given at setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapValue(Box<[i64]>);

// NOTE: Slot indices come from `ValueTypes`, which also sized the record
#[allow(clippy::indexing_slicing)]
impl MapValue {
    /// Reads a LONG slot.
    #[must_use]
    pub fn get_i64(&self, idx: usize) -> i64 {
        self.0[idx]
    }

    /// Writes a LONG slot.
    pub fn put_i64(&mut self, idx: usize, value: i64) {
        self.0[idx] = value;
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
