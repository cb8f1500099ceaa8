use crate::{Arena, BufferHandle, MapValue, Observation, ENTRY_SIZE};

/// Capacity, in entries, of a group's first buffer.
pub const INITIAL_CAPACITY: usize = 16;

/// Number of 64-bit slots a buffer occupies in the group record.
///
/// ```text
/// +0  buffer handle (0 = no observations)
/// +1  observation count
/// +2  capacity in entries
/// ```
pub const SLOT_COUNT: usize = 3;

fn slot_to_len(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or_default()
}

fn len_to_slot(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Growable array of observations belonging to one group in one arena.
///
/// Only the three describing fields live here; the entries themselves
/// sit in the arena, [`ENTRY_SIZE`] bytes each, in arrival order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Buffer {
    pub ptr: Option<BufferHandle>,
    pub count: usize,
    pub capacity: usize,
}

impl Buffer {
    /// The canonical empty state.
    pub const EMPTY: Self = Self {
        ptr: None,
        count: 0,
        capacity: 0,
    };

    /// Reads the buffer fields from a group record.
    pub fn load(value: &MapValue, idx: usize) -> Self {
        let count = slot_to_len(value.get_i64(idx + 1));

        Self {
            ptr: BufferHandle::from_raw(value.get_i64(idx)),
            count,
            capacity: slot_to_len(value.get_i64(idx + 2)),
        }
    }

    /// Writes the buffer fields back into a group record.
    pub fn store(self, value: &mut MapValue, idx: usize) {
        value.put_i64(idx, self.ptr.map_or(0, BufferHandle::to_raw));
        value.put_i64(idx + 1, len_to_slot(self.count));
        value.put_i64(idx + 2, len_to_slot(self.capacity));
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Starts a buffer from the first observation of a group.
    ///
    /// Invalid observations yield the empty state without allocating.
    pub fn first(arena: &mut Arena, obs: Observation) -> Self {
        if !obs.is_valid() {
            return Self::EMPTY;
        }

        let ptr = arena.malloc(INITIAL_CAPACITY * ENTRY_SIZE);
        obs.encode_into(arena.slice_mut(ptr, ENTRY_SIZE));

        Self {
            ptr: Some(ptr),
            count: 1,
            capacity: INITIAL_CAPACITY,
        }
    }

    /// Appends an observation, doubling the capacity if the buffer is full.
    ///
    /// Invalid observations are skipped. A buffer that only ever saw invalid
    /// observations starts over as if this was the first one.
    pub fn push(&mut self, arena: &mut Arena, obs: Observation) {
        if !obs.is_valid() {
            return;
        }

        let Some(mut ptr) = self.ptr.filter(|_| self.count > 0) else {
            *self = Self::first(arena, obs);
            return;
        };

        if self.count >= self.capacity {
            let capacity = (self.capacity * 2).max(INITIAL_CAPACITY);
            let grown = arena.malloc(capacity * ENTRY_SIZE);
            arena.copy_within(ptr, grown, self.count * ENTRY_SIZE);

            log::trace!(
                "growing buffer from {} to {capacity} entries",
                self.capacity
            );

            // NOTE: The old buffer is abandoned, the arena reclaims it on reset
            ptr = grown;
            self.ptr = Some(grown);
            self.capacity = capacity;
        }

        obs.encode_into(arena.slice_mut(ptr.offset_by(self.count * ENTRY_SIZE), ENTRY_SIZE));
        self.count += 1;
    }

    /// Encoded entries, `count * ENTRY_SIZE` bytes.
    pub fn bytes<'a>(&self, arena: &'a Arena) -> &'a [u8] {
        match self.ptr {
            Some(ptr) => arena.slice(ptr, self.count * ENTRY_SIZE),
            None => &[],
        }
    }

    /// Decodes the entries in buffer order.
    pub fn iter<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = Observation> + 'a {
        self.bytes(arena)
            .chunks_exact(ENTRY_SIZE)
            .map(Observation::decode)
    }
}
