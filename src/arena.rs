use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

const OFFSET_BITS: u32 = 48;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;
const ALIGN: usize = 8;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

fn next_arena_id() -> u64 {
    loop {
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
        if id != 0 {
            return id;
        }
    }
}

/// Handle to memory allocated in an [`Arena`].
///
/// Packs the owning arena's id (upper 16 bits) with a byte offset (lower 48 bits),
/// so a handle is never zero and can be stored in a 64-bit state slot where `0` means
/// "no buffer".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(NonZeroU64);

impl BufferHandle {
    fn new(arena_id: u64, offset: usize) -> Self {
        let raw = (arena_id << OFFSET_BITS) | (offset as u64 & OFFSET_MASK);

        #[allow(clippy::expect_used)]
        Self(NonZeroU64::new(raw).expect("arena id is never zero"))
    }

    /// Converts the handle into its raw slot representation.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn to_raw(self) -> i64 {
        self.0.get() as i64
    }

    /// Reads a handle back from its raw slot representation, `0` meaning none.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_raw(raw: i64) -> Option<Self> {
        NonZeroU64::new(raw as u64).map(Self)
    }

    /// Returns a handle pointing `bytes` further into the same allocation.
    #[must_use]
    pub fn offset_by(self, bytes: usize) -> Self {
        Self::new(self.arena_id(), self.offset() + bytes)
    }

    fn arena_id(self) -> u64 {
        self.0.get() >> OFFSET_BITS
    }

    #[allow(clippy::cast_possible_truncation)]
    fn offset(self) -> usize {
        (self.0.get() & OFFSET_MASK) as usize
    }
}

/// Bump allocator for per-group buffers.
///
/// Individual allocations are never freed; all memory is reclaimed at once
/// when the arena is [`reset`](Arena::reset) or dropped. One arena belongs to
/// exactly one worker, ownership is what keeps it free of synchronization.
///
/// Every reset assigns a fresh arena id, so handles minted before the reset
/// never compare equal to handles minted after it.
pub struct Arena {
    id: u64,
    mem: Vec<u8>,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Arena#{}({} bytes)", self.id, self.mem.len())
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

// NOTE: Handles are only minted by `malloc`, so offsets handed back to us
// are always inside `mem`; a bad handle is a caller bug and panics.
#[allow(clippy::indexing_slicing)]
impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty arena with room for `bytes` before the backing memory grows.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            id: next_arena_id(),
            mem: Vec::with_capacity(bytes),
        }
    }

    /// Allocates `size` zeroed bytes, 8-byte aligned, and returns a handle to them.
    ///
    /// # Panics
    ///
    /// Panics if the arena outgrows the 48-bit offset space, or if the host is
    /// out of memory. Neither is recoverable.
    pub fn malloc(&mut self, size: usize) -> BufferHandle {
        let offset = self.mem.len().next_multiple_of(ALIGN);
        let end = offset + size;

        assert!(end as u64 <= OFFSET_MASK, "arena exhausted");

        self.mem.resize(end, 0);

        BufferHandle::new(self.id, offset)
    }

    /// Returns `true` if the handle was allocated by this arena since its last reset.
    #[must_use]
    pub fn owns(&self, handle: BufferHandle) -> bool {
        handle.arena_id() == self.id && handle.offset() < self.mem.len()
    }

    /// Borrows `len` bytes starting at `handle`.
    #[must_use]
    pub fn slice(&self, handle: BufferHandle, len: usize) -> &[u8] {
        debug_assert!(self.owns(handle) || len == 0);
        let start = handle.offset();
        &self.mem[start..start + len]
    }

    /// Mutably borrows `len` bytes starting at `handle`.
    pub fn slice_mut(&mut self, handle: BufferHandle, len: usize) -> &mut [u8] {
        debug_assert!(self.owns(handle) || len == 0);
        let start = handle.offset();
        &mut self.mem[start..start + len]
    }

    /// Copies `len` bytes between two allocations of this arena.
    pub fn copy_within(&mut self, src: BufferHandle, dst: BufferHandle, len: usize) {
        debug_assert!((self.owns(src) && self.owns(dst)) || len == 0);
        let start = src.offset();
        self.mem.copy_within(start..start + len, dst.offset());
    }

    /// Copies `len` bytes from an allocation of another arena into this one.
    pub fn copy_from(
        &mut self,
        src_arena: &Self,
        src: BufferHandle,
        dst: BufferHandle,
        len: usize,
    ) {
        self.slice_mut(dst, len)
            .copy_from_slice(src_arena.slice(src, len));
    }

    /// Number of bytes handed out since the last reset, including alignment padding.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.mem.len()
    }

    /// Releases every allocation at once, keeping the backing memory for reuse.
    ///
    /// All previously returned handles become invalid.
    pub fn reset(&mut self) {
        log::trace!(
            "resetting arena {} ({} bytes allocated)",
            self.id,
            self.mem.len()
        );
        self.mem.clear();
        self.id = next_arena_id();
    }
}
