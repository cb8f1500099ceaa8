use super::buffer::{Buffer, INITIAL_CAPACITY};
use crate::{Arena, Observation, ENTRY_SIZE};

/// Merges the sorted buffer `src` (living in `src_arena`) into the sorted
/// buffer `dest` (living in `arena`), returning the merged buffer.
///
/// The result is always allocated in `arena`, never aliasing `src_arena`,
/// because the source arena is reclaimed independently of the destination.
/// On equal timestamps, destination entries come first.
pub fn merge(arena: &mut Arena, dest: Buffer, src: Buffer, src_arena: &Arena) -> Buffer {
    let Some(src_ptr) = src.ptr.filter(|_| !src.is_empty()) else {
        return dest;
    };

    let Some(dest_ptr) = dest.ptr.filter(|_| !dest.is_empty()) else {
        let capacity = INITIAL_CAPACITY.max(src.count);
        let ptr = arena.malloc(capacity * ENTRY_SIZE);
        arena.copy_from(src_arena, src_ptr, ptr, src.count * ENTRY_SIZE);

        return Buffer {
            ptr: Some(ptr),
            count: src.count,
            capacity,
        };
    };

    let count = dest.count + src.count;
    let merged = arena.malloc(count * ENTRY_SIZE);

    log::trace!(
        "merging {} + {} observations into {merged:?}",
        dest.count,
        src.count
    );

    let (mut di, mut si, mut mi) = (0, 0, 0);

    while di < dest.count && si < src.count {
        let dest_entry = dest_ptr.offset_by(di * ENTRY_SIZE);
        let src_entry = src_ptr.offset_by(si * ENTRY_SIZE);
        let out = merged.offset_by(mi * ENTRY_SIZE);

        let dest_ts = Observation::decode_ts(arena.slice(dest_entry, ENTRY_SIZE));
        let src_ts = Observation::decode_ts(src_arena.slice(src_entry, ENTRY_SIZE));

        if dest_ts <= src_ts {
            arena.copy_within(dest_entry, out, ENTRY_SIZE);
            di += 1;
        } else {
            arena.copy_from(src_arena, src_entry, out, ENTRY_SIZE);
            si += 1;
        }
        mi += 1;
    }

    // NOTE: At most one of the runs has a tail left
    if di < dest.count {
        arena.copy_within(
            dest_ptr.offset_by(di * ENTRY_SIZE),
            merged.offset_by(mi * ENTRY_SIZE),
            (dest.count - di) * ENTRY_SIZE,
        );
    }
    if si < src.count {
        arena.copy_from(
            src_arena,
            src_ptr.offset_by(si * ENTRY_SIZE),
            merged.offset_by(mi * ENTRY_SIZE),
            (src.count - si) * ENTRY_SIZE,
        );
    }

    Buffer {
        ptr: Some(merged),
        count,
        capacity: count,
    }
}
