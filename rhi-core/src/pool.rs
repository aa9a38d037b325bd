//! Fixed-capacity slot pool with free-list recycling and generation-checked handles.
//!
//! Grounded on `src/allocators/pool.c`'s intrusive free-list (`pool_push`/`pool_free`
//! pop/push the head of a singly-linked chain of `pool_element`s), reworked per
//! REDESIGN FLAGS: instead of raw pointer arithmetic over a byte array, `Pool<T>` is
//! a typed `Vec<Slot<T>>` and `Handle<T>` (see `rhi-types`) carries a `generation` so
//! a handle into a slot that has since been freed-and-reused is rejected rather than
//! silently aliasing.

use rhi_types::Handle;

use crate::error::RhiError;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// `index 0` is pre-consumed at construction so it can serve as the invalid
/// sentinel, matching the original engine's `pool_alloc(...)` call right after
/// each pool is created in `vulkan_renderer_create`.
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    /// Usable capacity, not counting the pre-consumed sentinel slot 0.
    capacity: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self {
            slots: Vec::with_capacity(capacity + 1),
            free: Vec::with_capacity(capacity),
            capacity,
        };
        pool.slots.push(Slot {
            generation: 0,
            value: None,
        });
        pool
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a slot and stores `value` in it, returning a handle stamped with the
    /// slot's current generation. Fails once `slots.len()` would exceed `capacity`
    /// and there is no freed slot to recycle.
    pub fn alloc(&mut self, value: T) -> Result<Handle<T>, RhiError> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Ok(Handle::new(index, slot.generation));
        }
        if self.slots.len() - 1 >= self.capacity {
            return Err(RhiError::PoolExhausted {
                capacity: self.capacity,
            });
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Ok(Handle::new(index, 0))
    }

    /// Removes and returns the slot's value, bumping its generation so any
    /// outstanding handle into it is rejected by a later `get`/`free`.
    pub fn free(&mut self, handle: Handle<T>) -> Result<T, RhiError> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take().ok_or_else(|| RhiError::invalid_handle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        Ok(value)
    }

    pub fn get(&self, handle: Handle<T>) -> Result<&T, RhiError> {
        self.slot(handle)?
            .value
            .as_ref()
            .ok_or_else(|| RhiError::invalid_handle(handle))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T, RhiError> {
        let slot = self.slot_mut(handle)?;
        slot.value
            .as_mut()
            .ok_or_else(|| RhiError::InvalidHandle {
                index: 0,
                generation: 0,
            })
    }

    /// Consumes the pool, yielding every still-live value. Used by `Context::drop` to
    /// tear down whatever callers never explicitly destroyed.
    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.slots.into_iter().filter_map(|slot| slot.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(index as u32, slot.generation), v))
        })
    }

    fn slot(&self, handle: Handle<T>) -> Result<&Slot<T>, RhiError> {
        if !handle.is_valid() {
            return Err(RhiError::invalid_handle(handle));
        }
        let slot = self
            .slots
            .get(handle.index() as usize)
            .ok_or_else(|| RhiError::invalid_handle(handle))?;
        if slot.generation != handle.generation() {
            return Err(RhiError::invalid_handle(handle));
        }
        Ok(slot)
    }

    fn slot_mut(&mut self, handle: Handle<T>) -> Result<&mut Slot<T>, RhiError> {
        if !handle.is_valid() {
            return Err(RhiError::invalid_handle(handle));
        }
        let generation = handle.generation();
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .ok_or_else(|| RhiError::invalid_handle(handle))?;
        if slot.generation != generation {
            return Err(RhiError::invalid_handle(handle));
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_never_returns_index_zero() {
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        let handle = pool.alloc(7).unwrap();
        assert_ne!(handle.index(), 0);
    }

    #[test]
    fn free_then_reuse_bumps_generation() {
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        let first = pool.alloc(1).unwrap();
        pool.free(first).unwrap();
        let second = pool.alloc(2).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(pool.get(first).is_err());
        assert_eq!(*pool.get(second).unwrap(), 2);
    }

    #[test]
    fn exhausted_pool_errors() {
        let mut pool: Pool<u32> = Pool::with_capacity(1);
        pool.alloc(1).unwrap();
        assert!(matches!(
            pool.alloc(2),
            Err(RhiError::PoolExhausted { capacity: 1 })
        ));
    }

    #[test]
    fn stale_handle_after_free_is_rejected() {
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        let handle = pool.alloc(1).unwrap();
        pool.free(handle).unwrap();
        assert!(pool.get(handle).is_err());
    }
}
