//! Typed buffers (Vertex/Index/Uniform) with N-slot striding for uniforms.
//!
//! Grounded on `vk_buffer.c`'s `vulkan_buffer_create`/`vulkan_buffer_write` and
//! §4.5's striding formulas.

use ash::vk;
use gpu_alloc::MemoryBlock;
use rhi_hal::Device;
use rhi_types::{BufferKind, IndexSize};

use crate::error::RhiError;
use crate::image::ResourceState;

pub struct Buffer {
    pub state: ResourceState,
    pub handle: vk::Buffer,
    pub memory: Option<MemoryBlock<vk::DeviceMemory>>,
    pub mapped_ptr: Option<*mut u8>,
    pub kind: BufferKind,
    /// Number of slots: `1` for vertex/index, `frames_in_flight * max_instance_count`
    /// for uniform buffers.
    pub count: u32,
    /// Total allocation size in bytes (`stride * count` for uniforms).
    pub size: u64,
    /// Per-slot stride, aligned to `minUniformBufferOffsetAlignment` for uniforms.
    pub stride: u64,
    pub usage: vk::BufferUsageFlags,
}

// Safety: the only raw field is `mapped_ptr`, a persistent host mapping of a
// buffer the context exclusively owns; `rhi-core` serializes all access per §5.
unsafe impl Send for Buffer {}

impl Buffer {
    pub fn create_vertex_or_index(
        device: &Device,
        kind: BufferKind,
        size: u64,
    ) -> Result<Self, RhiError> {
        debug_assert!(matches!(kind, BufferKind::Vertex | BufferKind::Index));
        let usage = vk::BufferUsageFlags::TRANSFER_DST
            | match kind {
                BufferKind::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
                BufferKind::Index => vk::BufferUsageFlags::INDEX_BUFFER,
                BufferKind::Uniform => unreachable!(),
            };
        Self::create_raw(device, kind, size, 1, size, usage, gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS)
    }

    pub fn create_uniform(
        device: &Device,
        element_size: u64,
        frames_in_flight: u32,
        max_instance_count: u32,
        min_ubo_align: u64,
    ) -> Result<Self, RhiError> {
        let stride = rhi_types::align_up(element_size, min_ubo_align.max(1));
        let count = frames_in_flight * max_instance_count.max(1);
        let size = stride * count as u64;
        let usage = vk::BufferUsageFlags::UNIFORM_BUFFER;
        let mut buffer = Self::create_raw(
            device,
            BufferKind::Uniform,
            size,
            count,
            stride,
            usage,
            gpu_alloc::UsageFlags::HOST_ACCESS | gpu_alloc::UsageFlags::UPLOAD,
        )?;
        let memory = buffer.memory.as_mut().expect("uniform buffer always backed");
        let mapped = unsafe {
            memory.map(
                gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()),
                0,
                size as usize,
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;
        buffer.mapped_ptr = Some(mapped.as_ptr());
        Ok(buffer)
    }

    /// A single host-visible, `TRANSFER_SRC` buffer backing the staging ring (§4.3).
    /// `total_size` covers every frame's partition; `StagingAllocator` divides it.
    pub fn create_staging(device: &Device, total_size: u64) -> Result<Self, RhiError> {
        let usage = vk::BufferUsageFlags::TRANSFER_SRC;
        let mut buffer = Self::create_raw(
            device,
            BufferKind::Uniform,
            total_size,
            1,
            total_size,
            usage,
            gpu_alloc::UsageFlags::HOST_ACCESS | gpu_alloc::UsageFlags::UPLOAD,
        )?;
        let memory = buffer.memory.as_mut().expect("staging buffer always backed");
        let mapped = unsafe {
            memory.map(
                gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()),
                0,
                total_size as usize,
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;
        buffer.mapped_ptr = Some(mapped.as_ptr());
        Ok(buffer)
    }

    fn create_raw(
        device: &Device,
        kind: BufferKind,
        size: u64,
        count: u32,
        stride: u64,
        usage: vk::BufferUsageFlags,
        memory_usage: gpu_alloc::UsageFlags,
    ) -> Result<Self, RhiError> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { device.raw().create_buffer(&create_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;
        let requirements = unsafe { device.raw().get_buffer_memory_requirements(handle) };
        let memory = unsafe {
            device.mem_allocator.lock().alloc(
                gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()),
                gpu_alloc::Request {
                    size: requirements.size,
                    align_mask: requirements.alignment - 1,
                    usage: memory_usage,
                    memory_types: requirements.memory_type_bits,
                },
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;
        unsafe {
            device
                .raw()
                .bind_buffer_memory(handle, *memory.memory(), memory.offset())
        }
        .map_err(rhi_hal::DeviceError::from)?;

        log::debug!("buffer created: kind={kind:?} size={size} count={count}");

        Ok(Self {
            state: ResourceState::Initialized,
            handle,
            memory: Some(memory),
            mapped_ptr: None,
            kind,
            count,
            size,
            stride,
            usage,
        })
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe {
            device.raw().destroy_buffer(self.handle, None);
            if let Some(memory) = self.memory.take() {
                device
                    .mem_allocator
                    .lock()
                    .dealloc(gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()), memory);
            }
        }
        self.state = ResourceState::Uninitialized;
        log::debug!("buffer destroyed");
    }

    /// `slot = frame * max_instance_count + instance` for uniform buffers; writes
    /// `data` at `self.stride * slot + offset` into the persistent mapping.
    pub fn write_mapped(&self, slot: u32, offset: u64, data: &[u8]) -> Result<(), RhiError> {
        let mapped = self.mapped_ptr.ok_or(RhiError::InvalidHandle {
            index: 0,
            generation: 0,
        })?;
        let base = self.stride * slot as u64 + offset;
        if base + data.len() as u64 > self.size {
            return Err(RhiError::StagingOverflow {
                requested: data.len() as u64,
                available: self.size.saturating_sub(base),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(base as usize), data.len());
        }
        Ok(())
    }

    /// Records a `TRANSFER → VERTEX_INPUT` copy-and-barrier from `src` (the staging
    /// buffer) at `src_offset` into `self` at `dst_offset`, per §4.5's device-local
    /// `buffer_write` path.
    pub fn copy_from_staging(
        &self,
        device: &Device,
        cmd: vk::CommandBuffer,
        src: &Buffer,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        let region = vk::BufferCopy::default()
            .src_offset(src_offset)
            .dst_offset(dst_offset)
            .size(size);
        unsafe {
            device
                .raw()
                .cmd_copy_buffer(cmd, src.handle, self.handle, &[region]);
        }
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ | vk::AccessFlags::INDEX_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.handle)
            .offset(dst_offset)
            .size(size);
        unsafe {
            device.raw().cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    pub fn bind_as_vertex(&self, device: &Device, cmd: vk::CommandBuffer) {
        debug_assert!(self.usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
        unsafe {
            device
                .raw()
                .cmd_bind_vertex_buffers(cmd, 0, &[self.handle], &[0]);
        }
    }

    pub fn bind_as_index(&self, device: &Device, cmd: vk::CommandBuffer, index_size: IndexSize) {
        debug_assert!(self.usage.contains(vk::BufferUsageFlags::INDEX_BUFFER));
        let index_type = match index_size {
            IndexSize::Uint16 => vk::IndexType::UINT16,
            IndexSize::Uint32 => vk::IndexType::UINT32,
        };
        unsafe {
            device
                .raw()
                .cmd_bind_index_buffer(cmd, self.handle, 0, index_type);
        }
    }
}
