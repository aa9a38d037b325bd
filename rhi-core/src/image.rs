//! Image + view + memory trio, layout state machine, and MSAA scratch lifetime.
//!
//! Grounded on `vk_image.c`'s `vulkan_image_create`/`vulkan_image_transition` and
//! `vk_internal.h`'s `VulkanImage` struct.

use ash::vk;
use gpu_alloc::MemoryBlock;
use rhi_hal::Device;
use rhi_types::{Format, ImageType};

use crate::error::RhiError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResourceState {
    Uninitialized,
    Initialized,
}

pub struct Image {
    pub state: ResourceState,
    pub handle: vk::Image,
    pub view: vk::ImageView,
    pub memory: Option<MemoryBlock<vk::DeviceMemory>>,
    pub layout: vk::ImageLayout,
    pub aspect: vk::ImageAspectFlags,
    pub image_type: ImageType,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub sample_count: vk::SampleCountFlags,
}

pub struct ImageCreateInfo {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub image_type: ImageType,
    pub sample_count: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub memory_usage: gpu_alloc::UsageFlags,
}

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32Float => vk::Format::D32_SFLOAT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
    }
}

impl Image {
    pub fn create(device: &Device, info: &ImageCreateInfo) -> Result<Self, RhiError> {
        let vk_format = format_to_vk(info.format);
        let aspect = if info.format.is_depth() {
            let mut a = vk::ImageAspectFlags::DEPTH;
            if info.format.has_stencil() {
                a |= vk::ImageAspectFlags::STENCIL;
            }
            a
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let mut create_info = vk::ImageCreateInfo::default()
            .image_type(if info.image_type == ImageType::D3 {
                vk::ImageType::TYPE_3D
            } else {
                vk::ImageType::TYPE_2D
            })
            .format(vk_format)
            .extent(vk::Extent3D {
                width: info.width,
                height: info.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(info.image_type.layer_count())
            .samples(info.sample_count)
            .tiling(info.tiling)
            .usage(info.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if info.image_type == ImageType::Cube {
            create_info = create_info.flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);
        }

        let handle = unsafe { device.raw().create_image(&create_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;
        let requirements = unsafe { device.raw().get_image_memory_requirements(handle) };

        let memory = unsafe {
            device.mem_allocator.lock().alloc(
                gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()),
                gpu_alloc::Request {
                    size: requirements.size,
                    align_mask: requirements.alignment - 1,
                    usage: info.memory_usage,
                    memory_types: requirements.memory_type_bits,
                },
            )
        }
        .map_err(|_| RhiError::Device(rhi_hal::DeviceError::OutOfMemory))?;

        unsafe {
            device
                .raw()
                .bind_image_memory(handle, *memory.memory(), memory.offset())
        }
        .map_err(rhi_hal::DeviceError::from)?;

        let view_type = match info.image_type {
            ImageType::D1 => vk::ImageViewType::TYPE_1D,
            ImageType::D2 => vk::ImageViewType::TYPE_2D,
            ImageType::D3 => vk::ImageViewType::TYPE_3D,
            ImageType::Cube => vk::ImageViewType::CUBE,
        };
        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(handle)
            .view_type(view_type)
            .format(vk_format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: info.image_type.layer_count(),
            });
        let view = unsafe { device.raw().create_image_view(&view_create_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;

        log::debug!(
            "image created: {}x{} {:?} ({:?})",
            info.width,
            info.height,
            info.format,
            info.image_type
        );

        Ok(Self {
            state: ResourceState::Initialized,
            handle,
            view,
            memory: Some(memory),
            layout: vk::ImageLayout::UNDEFINED,
            aspect,
            image_type: info.image_type,
            format: info.format,
            width: info.width,
            height: info.height,
            sample_count: info.sample_count,
        })
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe {
            device.raw().destroy_image_view(self.view, None);
            device.raw().destroy_image(self.handle, None);
            if let Some(memory) = self.memory.take() {
                device
                    .mem_allocator
                    .lock()
                    .dealloc(gpu_alloc_ash::AshMemoryDevice::wrap(device.raw()), memory);
            }
        }
        self.state = ResourceState::Uninitialized;
        log::debug!("image destroyed");
    }

    /// Transitions this image to `new_layout`, issuing a single pipeline barrier
    /// covering the whole resource, and records the result in `self.layout`.
    ///
    /// Table lookups follow §4.4 exactly; unknown pairs degrade to
    /// `ALL_COMMANDS`/`MEMORY_READ|MEMORY_WRITE` with a warning, matching the spec's
    /// "Unknown pairs degrade ... (warned)" note.
    pub fn transition_auto(&mut self, device: &Device, cmd: vk::CommandBuffer, new_layout: vk::ImageLayout) {
        let (src_stage, src_access) = src_stage_access(self.layout);
        let (dst_stage, dst_access) = dst_stage_access(new_layout);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(self.layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.handle)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: self.image_type.layer_count(),
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            device.raw().cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        self.layout = new_layout;
    }

    /// Records a `vkCmdCopyBufferToImage` from `src` at `src_offset` into this
    /// image's single mip/layer. Caller must have already transitioned the image
    /// to `TRANSFER_DST_OPTIMAL`.
    pub fn copy_from_staging(
        &self,
        device: &Device,
        cmd: vk::CommandBuffer,
        src: &crate::buffer::Buffer,
        src_offset: u64,
    ) {
        debug_assert_eq!(self.layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        let region = vk::BufferImageCopy::default()
            .buffer_offset(src_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: self.aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: self.image_type.layer_count(),
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: self.width,
                height: self.height,
                depth: 1,
            });
        unsafe {
            device.raw().cmd_copy_buffer_to_image(
                cmd,
                src.handle,
                self.handle,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }
}

fn src_stage_access(layout: vk::ImageLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED | vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty())
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        other => {
            log::warn!("unhandled source layout {other:?} in transition table, using ALL_COMMANDS");
            (
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            )
        }
    }
}

fn dst_stage_access(layout: vk::ImageLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty())
        }
        other => {
            log::warn!("unhandled destination layout {other:?} in transition table, using ALL_COMMANDS");
            (
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            )
        }
    }
}
