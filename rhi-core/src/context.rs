//! Top-level facade: owns every Vulkan object and resource registry and exposes
//! the handle-based create/destroy/bind operations the rest of the system calls.
//!
//! Grounded on `vk_renderer.c`'s `vulkan_renderer_create`, which bring-up order and
//! pool sizing (`MAX_BUFFERS`, `MAX_TEXTURES`, `MAX_SAMPLERS`, `MAX_SHADERS` from
//! `vulkan_api.h`) this module mirrors directly.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rhi_hal::{Adapter, Device, Instance, Queue, Surface, Swapchain, SwapchainConfig};
use rhi_types::{BufferKind, Handle, ImageType, SamplerDesc};

use crate::buffer::Buffer;
use crate::descriptor::{BindingDescriptor, GlobalResource, GroupResource};
use crate::error::RhiError;
use crate::frame::FrameOrchestrator;
use crate::image::{Image, ImageCreateInfo};
use crate::pool::Pool;
use crate::sampler::Sampler;
use crate::shader::{Shader, ShaderConfig};
use crate::staging::StagingAllocator;

// Pool sizing mirrors `vulkan_api.h`'s constants exactly, except
// `MAX_GLOBAL_RESOURCES`/`MAX_GROUP_RESOURCES`, which the original leaves as
// commented-out placeholders (`renderer.c`'s disabled `index_recycler_create`
// calls) — chosen here to comfortably cover one global resource (the per-frame
// camera UBO) and one material group per shader variant.
const MAX_BUFFERS: usize = 1024;
const MAX_TEXTURES: usize = 512;
const MAX_SAMPLERS: usize = 32;
const MAX_SHADERS: usize = 32;
const MAX_GLOBAL_RESOURCES: usize = 8;
const MAX_GROUP_RESOURCES: usize = 256;

/// Explicit configuration passed by the host application at context creation
/// (§9.6) — the RHI never reads a config file or argv itself.
#[derive(Copy, Clone, Debug)]
pub struct RhiConfig {
    pub width: u32,
    pub height: u32,
    pub present_mode: vk::PresentModeKHR,
    pub enable_validation: bool,
    /// Total size of the host-visible staging ring, split evenly across
    /// `MAX_FRAMES_IN_FLIGHT` partitions. Defaults to `rhi_types::MIN_STAGING_CAPACITY`.
    pub staging_capacity: u64,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            present_mode: vk::PresentModeKHR::FIFO,
            enable_validation: cfg!(debug_assertions),
            staging_capacity: rhi_types::MIN_STAGING_CAPACITY,
        }
    }
}

pub struct Context {
    _instance: Arc<Instance>,
    adapter: Adapter,
    device: Device,
    surface: Surface,
    swapchain: Swapchain,
    graphics_queue: Queue,
    present_queue: Queue,
    frames: FrameOrchestrator,

    staging_buffer: Buffer,
    staging: StagingAllocator,

    images: Pool<Image>,
    buffers: Pool<Buffer>,
    samplers: Pool<Sampler>,
    shaders: Pool<Shader>,
    global_resources: Pool<GlobalResource>,
    group_resources: Pool<GroupResource>,

    width: u32,
    height: u32,
    present_mode: vk::PresentModeKHR,
}

impl Context {
    pub fn new(
        window: &(impl HasDisplayHandle + HasWindowHandle),
        config: &RhiConfig,
    ) -> Result<Self, RhiError> {
        let width = config.width;
        let height = config.height;

        let instance = Instance::new(window, config.enable_validation)?;
        let surface = instance.create_surface(window)?;

        let adapters = instance.enumerate_adapters()?;
        let adapter = adapters
            .into_iter()
            .find(|a| a.queue_families(&surface).is_ok())
            .ok_or(RhiError::Instance(rhi_hal::InstanceError::NoAdapter))?;
        let (graphics_family, present_family) = adapter
            .queue_families(&surface)
            .map_err(RhiError::Instance)?;

        let device = Device::new(&adapter, graphics_family, present_family)?;
        let graphics_queue = Queue::new(device.graphics_queue);
        let present_queue = Queue::new(device.present_queue);

        let swapchain = Swapchain::new(
            &device,
            &surface,
            &SwapchainConfig {
                width,
                height,
                present_mode: config.present_mode,
            },
            None,
        )?;

        let frames = FrameOrchestrator::new(&device, graphics_family)?;

        let staging_capacity = config.staging_capacity.max(rhi_types::MIN_STAGING_CAPACITY);
        let staging_buffer = Buffer::create_staging(&device, staging_capacity)?;
        let mapped = staging_buffer
            .mapped_ptr
            .expect("staging buffer is always host-mapped");
        let staging = StagingAllocator::new(mapped, staging_buffer.size, rhi_types::MAX_FRAMES_IN_FLIGHT as u64);

        log::info!("render context ready: {width}x{height} on {}", adapter.info().name);

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            surface,
            swapchain,
            graphics_queue,
            present_queue,
            frames,
            staging_buffer,
            staging,
            images: Pool::with_capacity(MAX_TEXTURES),
            buffers: Pool::with_capacity(MAX_BUFFERS),
            samplers: Pool::with_capacity(MAX_SAMPLERS),
            shaders: Pool::with_capacity(MAX_SHADERS),
            global_resources: Pool::with_capacity(MAX_GLOBAL_RESOURCES),
            group_resources: Pool::with_capacity(MAX_GROUP_RESOURCES),
            width,
            height,
            present_mode: config.present_mode,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn staging(&mut self) -> &mut StagingAllocator {
        &mut self.staging
    }

    pub fn create_image(&mut self, info: ImageCreateInfo) -> Result<Handle<Image>, RhiError> {
        let image = Image::create(&self.device, &info)?;
        self.images.alloc(image)
    }

    pub fn destroy_image(&mut self, handle: Handle<Image>) -> Result<(), RhiError> {
        let mut image = self.images.free(handle)?;
        image.destroy(&self.device);
        Ok(())
    }

    pub fn image(&self, handle: Handle<Image>) -> Result<&Image, RhiError> {
        self.images.get(handle)
    }

    /// Stages `pixels` and records a transition-copy-transition sequence into
    /// `frame`'s command buffer, leaving the image `SHADER_READ_ONLY_OPTIMAL`.
    pub fn upload_image(
        &mut self,
        handle: Handle<Image>,
        frame: &crate::frame::FrameContext,
        pixels: &[u8],
    ) -> Result<(), RhiError> {
        let copy_align = self.adapter.limits().optimal_buffer_copy_offset_alignment.max(1);
        let staged_offset = self.staging.write(frame.frame_index as u64, pixels, copy_align)?;

        let image = self.images.get_mut(handle)?;
        image.transition_auto(&self.device, frame.command_buffer, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        image.copy_from_staging(&self.device, frame.command_buffer, &self.staging_buffer, staged_offset);
        image.transition_auto(&self.device, frame.command_buffer, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        Ok(())
    }

    pub fn create_vertex_buffer(&mut self, size: u64) -> Result<Handle<Buffer>, RhiError> {
        let buffer = Buffer::create_vertex_or_index(&self.device, BufferKind::Vertex, size)?;
        self.buffers.alloc(buffer)
    }

    pub fn create_index_buffer(&mut self, size: u64) -> Result<Handle<Buffer>, RhiError> {
        let buffer = Buffer::create_vertex_or_index(&self.device, BufferKind::Index, size)?;
        self.buffers.alloc(buffer)
    }

    pub fn create_uniform_buffer(
        &mut self,
        element_size: u64,
        max_instance_count: u32,
    ) -> Result<Handle<Buffer>, RhiError> {
        let min_align = self
            .adapter
            .limits()
            .min_uniform_buffer_offset_alignment
            .max(1);
        let buffer = Buffer::create_uniform(
            &self.device,
            element_size,
            rhi_types::MAX_FRAMES_IN_FLIGHT as u32,
            max_instance_count,
            min_align,
        )?;
        self.buffers.alloc(buffer)
    }

    pub fn destroy_buffer(&mut self, handle: Handle<Buffer>) -> Result<(), RhiError> {
        let mut buffer = self.buffers.free(handle)?;
        buffer.destroy(&self.device);
        Ok(())
    }

    pub fn buffer(&self, handle: Handle<Buffer>) -> Result<&Buffer, RhiError> {
        self.buffers.get(handle)
    }

    /// `buffer_write` (§4.5): uniform buffers memcpy straight into the persistent
    /// mapping at `slot = frame * max_instance_count + instance`; vertex/index
    /// buffers stage through the ring and record a copy + barrier into `frame`'s
    /// command buffer.
    pub fn write_buffer(
        &mut self,
        handle: Handle<Buffer>,
        frame: &crate::frame::FrameContext,
        slot: u32,
        offset: u64,
        data: &[u8],
    ) -> Result<(), RhiError> {
        let buffer = self.buffers.get(handle)?;
        if buffer.kind == BufferKind::Uniform {
            return buffer.write_mapped(slot, offset, data);
        }

        let copy_align = self.adapter.limits().optimal_buffer_copy_offset_alignment.max(1);
        let staged_offset = self.staging.write(frame.frame_index as u64, data, copy_align)?;
        let buffer = self.buffers.get(handle)?;
        buffer.copy_from_staging(
            &self.device,
            frame.command_buffer,
            &self.staging_buffer,
            staged_offset,
            offset,
            data.len() as u64,
        );
        Ok(())
    }

    pub fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Handle<Sampler>, RhiError> {
        let sampler = Sampler::create(&self.device, desc)?;
        self.samplers.alloc(sampler)
    }

    pub fn destroy_sampler(&mut self, handle: Handle<Sampler>) -> Result<(), RhiError> {
        let mut sampler = self.samplers.free(handle)?;
        sampler.destroy(&self.device);
        Ok(())
    }

    pub fn create_shader(&mut self, config: &ShaderConfig) -> Result<Handle<Shader>, RhiError> {
        let shader = Shader::create(&self.device, config)?;
        self.shaders.alloc(shader)
    }

    pub fn destroy_shader(&mut self, handle: Handle<Shader>) -> Result<(), RhiError> {
        let mut shader = self.shaders.free(handle)?;
        shader.destroy(&self.device);
        Ok(())
    }

    pub fn shader_mut(&mut self, handle: Handle<Shader>) -> Result<&mut Shader, RhiError> {
        self.shaders.get_mut(handle)
    }

    /// `global_resource_create(bindings[])` (§4.7): builds the set-0 layout from
    /// `bindings`, allocating and mapping a per-frame UBO if one binding declares
    /// `UniformBuffer`/`UniformBufferDynamic`.
    pub fn create_global_resource(
        &mut self,
        bindings: &[BindingDescriptor],
    ) -> Result<Handle<GlobalResource>, RhiError> {
        let min_align = self.adapter.limits().min_uniform_buffer_offset_alignment.max(1);
        let resource = GlobalResource::create(
            &self.device,
            &mut self.device.descriptor_allocator.lock(),
            bindings,
            rhi_types::MAX_FRAMES_IN_FLIGHT as u32,
            min_align,
        )?;
        self.global_resources.alloc(resource)
    }

    pub fn destroy_global_resource(&mut self, handle: Handle<GlobalResource>) -> Result<(), RhiError> {
        let mut resource = self.global_resources.free(handle)?;
        resource.destroy(&self.device);
        Ok(())
    }

    pub fn global_resource(&self, handle: Handle<GlobalResource>) -> Result<&GlobalResource, RhiError> {
        self.global_resources.get(handle)
    }

    /// `group_resource_create(shader, max_instance_count)` (§4.7): reuses the
    /// shader's reflected set-1 layout and allocates the per-(frame, instance)
    /// dynamic UBO sized by the shader's `instance_size`, when nonzero.
    pub fn create_group_resource(
        &mut self,
        shader_handle: Handle<Shader>,
        max_instance_count: u32,
    ) -> Result<Handle<GroupResource>, RhiError> {
        let shader = self.shaders.get(shader_handle)?;
        let layout = *shader
            .reflected
            .set_layouts
            .get(1)
            .ok_or(RhiError::NoGroupDescriptorSetLayout)?;
        let ubo_binding = shader.reflected.group_ubo_binding;
        let instance_size = shader.reflected.instance_size;

        let min_align = self.adapter.limits().min_uniform_buffer_offset_alignment.max(1);
        let resource = GroupResource::create(
            &self.device,
            &mut self.device.descriptor_allocator.lock(),
            layout,
            max_instance_count,
            instance_size,
            ubo_binding,
            rhi_types::MAX_FRAMES_IN_FLIGHT as u32,
            min_align,
        )?;
        self.group_resources.alloc(resource)
    }

    pub fn destroy_group_resource(&mut self, handle: Handle<GroupResource>) -> Result<(), RhiError> {
        let mut resource = self.group_resources.free(handle)?;
        resource.destroy(&self.device);
        Ok(())
    }

    pub fn group_resource(&self, handle: Handle<GroupResource>) -> Result<&GroupResource, RhiError> {
        self.group_resources.get(handle)
    }

    /// `group_resource_set_texture_sampler` (§4.7): writes a combined-image-sampler
    /// descriptor for the material's texture binding.
    pub fn bind_group_texture(
        &mut self,
        handle: Handle<GroupResource>,
        binding: u32,
        image: Handle<Image>,
        sampler: Handle<Sampler>,
    ) -> Result<(), RhiError> {
        let view = self.images.get(image)?.view;
        let sampler = self.samplers.get(sampler)?;
        self.group_resources.get(handle)?.bind_texture(&self.device, view, sampler, binding);
        Ok(())
    }

    /// Writes an auxiliary combined-image-sampler descriptor into the global set
    /// (shadow map, post-fx source, ...).
    pub fn bind_global_texture(
        &mut self,
        handle: Handle<GlobalResource>,
        binding: u32,
        image: Handle<Image>,
        sampler: Handle<Sampler>,
    ) -> Result<(), RhiError> {
        let view = self.images.get(image)?.view;
        let sampler = self.samplers.get(sampler)?;
        self.global_resources.get(handle)?.bind_texture(&self.device, view, sampler, binding);
        Ok(())
    }

    /// Creates a cube- or 2D-compatible render target sized to the current swapchain
    /// extent, for shadow maps / offscreen passes that need to track resize.
    pub fn create_render_target(&mut self, format: rhi_types::Format, image_type: ImageType) -> Result<Handle<Image>, RhiError> {
        self.create_image(ImageCreateInfo {
            width: self.width,
            height: self.height,
            format,
            image_type,
            sample_count: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            memory_usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
        })
    }

    pub fn begin_frame(&mut self) -> Result<Option<crate::frame::FrameContext>, RhiError> {
        self.staging.begin_frame();
        self.frames.begin_frame(&self.device, &self.swapchain)
    }

    pub fn end_frame(&mut self, ctx: crate::frame::FrameContext) -> Result<bool, RhiError> {
        self.frames.end_frame(&self.device, &self.graphics_queue, &self.swapchain, ctx)
    }

    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<(), RhiError> {
        self.frames.wait_all_frames(&self.device)?;
        let old = std::mem::replace(
            &mut self.swapchain,
            Swapchain::new(
                &self.device,
                &self.surface,
                &SwapchainConfig {
                    width,
                    height,
                    present_mode: self.present_mode,
                },
                None,
            )?,
        );
        old.destroy(self.device.raw());
        self.width = width;
        self.height = height;
        log::info!("swapchain resized to {width}x{height}");
        Ok(())
    }

    pub fn wait_idle(&self) -> Result<(), RhiError> {
        self.device.wait_idle().map_err(RhiError::Device)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
        self.frames.destroy(&self.device);
        self.staging_buffer.destroy(&self.device);
        for mut resource in std::mem::replace(&mut self.group_resources, Pool::with_capacity(0)).into_values() {
            resource.destroy(&self.device);
        }
        for mut resource in std::mem::replace(&mut self.global_resources, Pool::with_capacity(0)).into_values() {
            resource.destroy(&self.device);
        }
        for mut shader in std::mem::replace(&mut self.shaders, Pool::with_capacity(0)).into_values() {
            shader.destroy(&self.device);
        }
        for mut sampler in std::mem::replace(&mut self.samplers, Pool::with_capacity(0)).into_values() {
            sampler.destroy(&self.device);
        }
        for mut buffer in std::mem::replace(&mut self.buffers, Pool::with_capacity(0)).into_values() {
            buffer.destroy(&self.device);
        }
        for mut image in std::mem::replace(&mut self.images, Pool::with_capacity(0)).into_values() {
            image.destroy(&self.device);
        }
    }
}
