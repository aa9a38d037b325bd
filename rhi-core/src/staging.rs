//! Host-visible ring buffer partitioned per in-flight frame.
//!
//! Grounded on `vulkan_renderer_create`'s `vulkan_buffer_create(context, MiB(256),
//! MAX_FRAMES_IN_FLIGHT, TRANSFER_SRC, HOST_VISIBLE|HOST_COHERENT, ...)` and
//! `vulkan_renderer_frame_begin`'s `context->staging_buffer.offset = 0` reset.

use crate::error::RhiError;

pub struct StagingAllocator {
    capacity: u64,
    frames_in_flight: u64,
    stride: u64,
    /// Byte offset within the current frame's partition; reset to 0 on `begin_frame`.
    cursor: u64,
    mapped: *mut u8,
}

// The staging allocator is only ever touched from the single host thread that
// drives frame recording (§5); the raw pointer is to a persistently-mapped
// Vulkan allocation that outlives the allocator itself.
unsafe impl Send for StagingAllocator {}

impl StagingAllocator {
    /// `mapped` must point at a persistently host-mapped buffer of at least `capacity`
    /// bytes, valid for the lifetime of this allocator.
    pub fn new(mapped: *mut u8, capacity: u64, frames_in_flight: u64) -> Self {
        assert!(capacity >= rhi_types::MIN_STAGING_CAPACITY || capacity > 0);
        Self {
            capacity,
            frames_in_flight,
            stride: capacity / frames_in_flight,
            cursor: 0,
            mapped,
        }
    }

    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    /// Aligns the cursor up to `align`, copies `data` into the current frame's
    /// partition, and returns the absolute offset within the backing buffer
    /// (i.e. already including `frame_index * stride`) for use as a copy source.
    pub fn write(&mut self, frame_index: u64, data: &[u8], align: u64) -> Result<u64, RhiError> {
        let aligned = rhi_types::align_up(self.cursor, align);
        let end = aligned + data.len() as u64;
        if end > self.stride {
            return Err(RhiError::StagingOverflow {
                requested: data.len() as u64,
                available: self.stride - aligned.min(self.stride),
            });
        }
        let absolute = frame_index * self.stride + aligned;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.mapped.add(absolute as usize),
                data.len(),
            );
        }
        self.cursor = end;
        Ok(absolute)
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing(capacity: usize) -> Vec<u8> {
        vec![0u8; capacity]
    }

    #[test]
    fn write_advances_cursor_and_returns_absolute_offset() {
        let mut backing = backing(1024);
        let mut staging = StagingAllocator::new(backing.as_mut_ptr(), 1024, 2);
        assert_eq!(staging.stride(), 512);
        let offset = staging.write(0, &[1, 2, 3, 4], 4).unwrap();
        assert_eq!(offset, 0);
        let offset = staging.write(1, &[5, 6], 4).unwrap();
        assert_eq!(offset, 512);
    }

    #[test]
    fn overflow_within_a_frame_partition_fails() {
        let mut backing = backing(16);
        let mut staging = StagingAllocator::new(backing.as_mut_ptr(), 16, 2);
        assert!(staging.write(0, &[0u8; 16], 1).is_err());
    }

    #[test]
    fn begin_frame_resets_cursor() {
        let mut backing = backing(1024);
        let mut staging = StagingAllocator::new(backing.as_mut_ptr(), 1024, 2);
        staging.write(0, &[1, 2, 3], 1).unwrap();
        staging.begin_frame();
        let offset = staging.write(0, &[9], 1).unwrap();
        assert_eq!(offset, 0);
    }
}
