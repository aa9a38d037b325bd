//! Bump allocator with scoped save/restore, plus two process-wide scratch arenas.
//!
//! Grounded on `src/allocators/arena.c`: a single contiguous buffer, a monotonic
//! `offset`, and `ArenaTemp` markers that let a caller roll the offset back to a
//! saved point. This rewrite stores bytes rather than handing out raw pointers —
//! `push` returns a `&mut [u8]` slice into the arena's own buffer instead of a
//! `void*`, since Rust has no sound way to hand out an untyped pointer into a
//! `Vec` and let the caller reinterpret it as they please.

use std::cell::RefCell;

use crate::error::RhiError;

/// Minimum default size for the two process-wide scratch arenas (`arena_get_scratch` in the
/// original engine lazily sizes them to 4 MiB each).
const SCRATCH_ARENA_CAPACITY: usize = 4 * 1024 * 1024;

pub struct Arena {
    buffer: Box<[u8]>,
    offset: usize,
}

#[derive(Copy, Clone)]
pub struct ArenaTemp {
    position: usize,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn used(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    /// Pushes `size` bytes aligned to `align` (must be a power of two), optionally
    /// zeroing them, and returns a slice into the arena's storage.
    pub fn push(&mut self, size: usize, align: usize, zero: bool) -> Result<&mut [u8], RhiError> {
        debug_assert!(align.is_power_of_two());
        let aligned = rhi_types::align_up(self.offset as u64, align as u64) as usize;
        let end = aligned
            .checked_add(size)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(RhiError::ArenaOutOfMemory {
                requested: size as u64,
                remaining: self.remaining() as u64,
            })?;
        if zero {
            self.buffer[aligned..end].fill(0);
        }
        self.offset = end;
        Ok(&mut self.buffer[aligned..end])
    }

    pub fn push_str(&mut self, s: &str) -> Result<&str, RhiError> {
        let slice = self.push(s.len(), 1, false)?;
        slice.copy_from_slice(s.as_bytes());
        // Safety: bytes were just copied verbatim from a valid `&str`.
        Ok(unsafe { std::str::from_utf8_unchecked(slice) })
    }

    pub fn clear(&mut self) {
        self.offset = 0;
    }

    pub fn begin_temp(&self) -> ArenaTemp {
        ArenaTemp {
            position: self.offset,
        }
    }

    pub fn end_temp(&mut self, temp: ArenaTemp) {
        debug_assert!(temp.position <= self.offset);
        self.offset = temp.position;
    }

    pub fn set(&mut self, position: usize) {
        debug_assert!(position <= self.offset);
        self.offset = position;
    }
}

thread_local! {
    static SCRATCH: RefCell<[Arena; 2]> = RefCell::new([
        Arena::new(SCRATCH_ARENA_CAPACITY),
        Arena::new(SCRATCH_ARENA_CAPACITY),
    ]);
}

/// Temporary RAII-free guard returned by [`scratch_begin`]. Call [`scratch_end`] with
/// it when done; modeled after `ArenaTemp`/`arena_release_scratch` rather than `Drop`
/// because the caller needs to name which of the two scratch slots it holds.
pub struct ScratchGuard {
    slot: usize,
    temp: ArenaTemp,
}

/// Returns a scratch arena that is not `conflict`, so two call sites can each hold
/// a scratch region without aliasing. `conflict` is `None` when the caller has no
/// other scratch arena in flight.
pub fn scratch_begin(conflict: Option<&ScratchGuard>) -> ScratchGuard {
    let avoid = conflict.map(|g| g.slot);
    let slot = if avoid == Some(0) { 1 } else { 0 };
    let temp = SCRATCH.with(|s| s.borrow()[slot].begin_temp());
    ScratchGuard { slot, temp }
}

pub fn scratch_push(guard: &ScratchGuard, size: usize, align: usize) -> Result<Vec<u8>, RhiError> {
    SCRATCH.with(|s| {
        let mut arenas = s.borrow_mut();
        arenas[guard.slot]
            .push(size, align, true)
            .map(|slice| slice.to_vec())
    })
}

pub fn scratch_end(guard: ScratchGuard) {
    SCRATCH.with(|s| s.borrow_mut()[guard.slot].end_temp(guard.temp));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_advances_offset_and_aligns() {
        let mut arena = Arena::new(64);
        let a = arena.push(3, 1, false).unwrap();
        a.copy_from_slice(&[1, 2, 3]);
        assert_eq!(arena.used(), 3);
        let _ = arena.push(1, 8, false).unwrap();
        assert_eq!(arena.used(), 9);
    }

    #[test]
    fn push_past_capacity_fails() {
        let mut arena = Arena::new(4);
        assert!(arena.push(5, 1, false).is_err());
    }

    #[test]
    fn temp_restores_offset() {
        let mut arena = Arena::new(64);
        arena.push(10, 1, false).unwrap();
        let temp = arena.begin_temp();
        arena.push(10, 1, false).unwrap();
        assert_eq!(arena.used(), 20);
        arena.end_temp(temp);
        assert_eq!(arena.used(), 10);
    }

    #[test]
    fn clear_resets_to_zero() {
        let mut arena = Arena::new(64);
        arena.push(10, 1, false).unwrap();
        arena.clear();
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn scratch_arenas_avoid_conflict() {
        let a = scratch_begin(None);
        let b = scratch_begin(Some(&a));
        assert_ne!(a.slot, b.slot);
        scratch_end(b);
        scratch_end(a);
    }
}
