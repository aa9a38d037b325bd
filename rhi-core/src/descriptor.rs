//! Global (set 0) and per-material group (set 1) descriptor resources, and the
//! dynamic-offset math that lets one descriptor set serve every frame/instance slot.
//!
//! Grounded on `vk_descriptor.c`'s `vulkan_descriptor_set_update`/`vulkan_renderer_bind_global`
//! and §4.7's "`frame * stride`" / "`(frame * max_instance + instance) * stride`" formulas.

use ash::vk;
use gpu_descriptor::{DescriptorAllocator, DescriptorSetLayoutCreateFlags, DescriptorTotalCount};
use gpu_descriptor_ash::AshDescriptorDevice;
use rhi_hal::Device;
use rhi_types::DescriptorKind;

use crate::buffer::Buffer;
use crate::error::RhiError;
use crate::sampler::Sampler;

/// One entry of a `global_resource_create(bindings[])` call (§4.7): `{binding,
/// type, size, count}`. `size` is only meaningful for `UniformBuffer`/
/// `UniformBufferDynamic` bindings — it is the unstrided byte size of one frame's
/// worth of the UBO, before `align_up(size, minUboAlign)`.
#[derive(Copy, Clone, Debug)]
pub struct BindingDescriptor {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub size: u64,
    pub count: u32,
}

/// A descriptor set bound once per frame (set 0): an optional per-frame UBO plus
/// auxiliary combined image-samplers (shadow map, post-fx source, ...). UBO offset
/// into the underlying buffer is `frame_index * stride`.
pub struct GlobalResource {
    pub set: vk::DescriptorSet,
    pub layout: vk::DescriptorSetLayout,
    pub buffer: Option<Buffer>,
    pub binding_descriptors: Vec<BindingDescriptor>,
}

/// A descriptor set bound once per draw call's material (set 1): a dynamic uniform
/// buffer slice plus a combined-image-sampler. Offset is
/// `(frame_index * max_instance_count + instance_index) * stride`.
pub struct GroupResource {
    pub set: vk::DescriptorSet,
    pub layout: vk::DescriptorSetLayout,
    pub buffer: Option<Buffer>,
    pub max_instance_count: u32,
}

fn vk_descriptor_type(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

fn add_to_total_count(counts: &mut DescriptorTotalCount, kind: DescriptorKind, amount: u32) {
    match kind {
        DescriptorKind::UniformBuffer => counts.uniform_buffer += amount,
        DescriptorKind::UniformBufferDynamic => counts.uniform_buffer_dynamic += amount,
        DescriptorKind::StorageBuffer => counts.storage_buffer += amount,
        DescriptorKind::SampledImage => counts.sampled_image += amount,
        DescriptorKind::Sampler => counts.sampler += amount,
        DescriptorKind::CombinedImageSampler => counts.combined_image_sampler += amount,
    }
}

impl GlobalResource {
    /// `global_resource_create(bindings[])` (§4.7): builds the set 0 layout from
    /// `bindings`, allocates the descriptor set, and — if one binding is a
    /// `UniformBuffer`/`UniformBufferDynamic` — creates and maps a per-frame UBO
    /// sized `align_up(size, minUboAlign) * frames_in_flight` and writes it in.
    /// At most one UBO binding is permitted, matching the original's
    /// `ASSERT(buffer_binding == -1)` before reassigning it.
    pub fn create(
        device: &Device,
        allocator: &mut DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>,
        bindings: &[BindingDescriptor],
        frames_in_flight: u32,
        min_ubo_align: u64,
    ) -> Result<Self, RhiError> {
        let ubo_binding = bindings
            .iter()
            .find(|b| matches!(b.kind, DescriptorKind::UniformBuffer | DescriptorKind::UniformBufferDynamic));

        // The UBO binding is always populated as a DYNAMIC_UBO (per §4.7), regardless
        // of whether the caller declared it `UniformBuffer` or `UniformBufferDynamic`,
        // so the layout must agree with the type the later `update_descriptor_sets`
        // write uses.
        let layout_bindings: Vec<_> = bindings
            .iter()
            .map(|b| {
                let descriptor_type = if matches!(b.kind, DescriptorKind::UniformBuffer | DescriptorKind::UniformBufferDynamic) {
                    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                } else {
                    vk_descriptor_type(b.kind)
                };
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(b.count.max(1))
                    .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)
            })
            .collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let layout = unsafe { device.raw().create_descriptor_set_layout(&layout_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;

        let mut counts = DescriptorTotalCount::default();
        for b in bindings {
            let counted_kind = if matches!(b.kind, DescriptorKind::UniformBuffer) {
                DescriptorKind::UniformBufferDynamic
            } else {
                b.kind
            };
            add_to_total_count(&mut counts, counted_kind, b.count.max(1));
        }

        let mut sets = unsafe {
            allocator.allocate(
                AshDescriptorDevice::wrap(device.raw()),
                &layout,
                DescriptorSetLayoutCreateFlags::empty(),
                &counts,
                1,
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;
        let set = *sets.remove(0).raw();

        let buffer = match ubo_binding {
            Some(b) => {
                let buffer = Buffer::create_uniform(device, b.size, frames_in_flight, 1, min_ubo_align)?;
                let buffer_info = [vk::DescriptorBufferInfo::default()
                    .buffer(buffer.handle)
                    .offset(0)
                    .range(buffer.stride)];
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(b.binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                    .buffer_info(&buffer_info);
                unsafe { device.raw().update_descriptor_sets(&[write], &[]) };
                Some(buffer)
            }
            None => None,
        };

        Ok(Self {
            set,
            layout,
            buffer,
            binding_descriptors: bindings.to_vec(),
        })
    }

    /// Writes a `COMBINED_IMAGE_SAMPLER` descriptor for an auxiliary binding (shadow
    /// map, post-fx source). Mirrors `group_resource_set_texture_sampler`.
    pub fn bind_texture(&self, device: &Device, view: vk::ImageView, sampler: &Sampler, binding: u32) {
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(view)
            .sampler(sampler.handle)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { device.raw().update_descriptor_sets(&[write], &[]) };
    }

    /// `frame_index * stride` — the dynamic offset passed to `vkCmdBindDescriptorSets`.
    pub fn dynamic_offset(stride: u64, frame_index: u32) -> u32 {
        (stride * frame_index as u64) as u32
    }

    /// Destroys the owned UBO (if any) and the set layout this resource built.
    /// The descriptor set itself is left to the pool's descriptor allocator.
    pub fn destroy(&mut self, device: &Device) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.destroy(device);
        }
        unsafe { device.raw().destroy_descriptor_set_layout(self.layout, None) };
    }
}

impl GroupResource {
    /// `group_resource_create(shader, max_instance_count)` (§4.7): reuses the
    /// shader's per-material set layout and, when `instance_size` is nonzero,
    /// allocates a dynamic-UBO sized `instance_size * max_instance_count *
    /// frames_in_flight`, maps it persistently, and writes it into
    /// `ubo_binding`. Grounded on `vk_resource.c`'s
    /// `vulkan_renderer_resource_group_create`, which skips the buffer entirely
    /// when `shader->instance_size == 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        device: &Device,
        allocator: &mut DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>,
        layout: vk::DescriptorSetLayout,
        max_instance_count: u32,
        instance_size: u32,
        ubo_binding: Option<u32>,
        frames_in_flight: u32,
        min_ubo_align: u64,
    ) -> Result<Self, RhiError> {
        let max_instance_count = max_instance_count.max(1);
        let counts = DescriptorTotalCount {
            uniform_buffer_dynamic: 1,
            combined_image_sampler: 1,
            ..Default::default()
        };
        let mut sets = unsafe {
            allocator.allocate(
                AshDescriptorDevice::wrap(device.raw()),
                &layout,
                DescriptorSetLayoutCreateFlags::empty(),
                &counts,
                1,
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;
        let set = *sets.remove(0).raw();

        let buffer = match ubo_binding {
            Some(binding) if instance_size != 0 => {
                let buffer = Buffer::create_uniform(
                    device,
                    instance_size as u64,
                    frames_in_flight,
                    max_instance_count,
                    min_ubo_align,
                )?;
                let buffer_info = [vk::DescriptorBufferInfo::default()
                    .buffer(buffer.handle)
                    .offset(0)
                    .range(buffer.stride)];
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                    .buffer_info(&buffer_info);
                unsafe { device.raw().update_descriptor_sets(&[write], &[]) };
                Some(buffer)
            }
            _ => None,
        };

        Ok(Self {
            set,
            layout,
            buffer,
            max_instance_count,
        })
    }

    pub fn bind_texture(&self, device: &Device, view: vk::ImageView, sampler: &Sampler, binding: u32) {
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(view)
            .sampler(sampler.handle)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { device.raw().update_descriptor_sets(&[write], &[]) };
    }

    /// `(frame_index * max_instance_count + instance_index) * stride`.
    pub fn dynamic_offset(&self, stride: u64, frame_index: u32, instance_index: u32) -> u32 {
        debug_assert!(instance_index < self.max_instance_count);
        (stride * (frame_index * self.max_instance_count + instance_index) as u64) as u32
    }

    /// Destroys the owned UBO, if any. `layout` is the shader's set-1 layout,
    /// borrowed rather than owned, and is destroyed when the shader is.
    pub fn destroy(&mut self, device: &Device) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.destroy(device);
        }
    }
}

/// Binds `global` at set 0 and `group` at set 1 with their respective dynamic offsets,
/// matching `vulkan_renderer_bind_global`/`vulkan_renderer_bind_material`.
pub fn bind_sets(
    device: &Device,
    cmd: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    global: &GlobalResource,
    global_offset: u32,
    group: Option<(&GroupResource, u32)>,
) {
    let mut sets = vec![global.set];
    let mut offsets = vec![global_offset];
    if let Some((group, group_offset)) = group {
        sets.push(group.set);
        offsets.push(group_offset);
    }
    unsafe {
        device.raw().cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline_layout,
            0,
            &sets,
            &offsets,
        );
    }
}

/// `resource_local_write` (§4.7): `vkCmdPushConstants` against `pipeline_layout`.
/// Takes the layout as a parameter rather than tracking a "currently bound shader"
/// on `Context` — there is no way to call this without first holding a
/// `pipeline_layout` sourced from a created [`crate::shader::Shader`], which is
/// what "fails if no shader is bound" amounts to once expressed in the type system.
pub fn push_constants(
    device: &Device,
    cmd: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    offset: u32,
    data: &[u8],
) {
    debug_assert!(data.len() as u32 <= rhi_types::MAX_PUSH_CONSTANT_SIZE);
    unsafe {
        device.raw().cmd_push_constants(
            cmd,
            pipeline_layout,
            vk::ShaderStageFlags::ALL_GRAPHICS,
            offset,
            data,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_offset_is_frame_times_stride() {
        assert_eq!(GlobalResource::dynamic_offset(256, 0), 0);
        assert_eq!(GlobalResource::dynamic_offset(256, 1), 256);
    }

    #[test]
    fn group_offset_interleaves_frame_and_instance() {
        let group = GroupResource {
            set: vk::DescriptorSet::null(),
            layout: vk::DescriptorSetLayout::null(),
            buffer: None,
            max_instance_count: 4,
        };
        assert_eq!(group.dynamic_offset(64, 0, 0), 0);
        assert_eq!(group.dynamic_offset(64, 0, 1), 64);
        assert_eq!(group.dynamic_offset(64, 1, 0), 64 * 4);
        assert_eq!(group.dynamic_offset(64, 1, 2), 64 * 6);
    }
}
