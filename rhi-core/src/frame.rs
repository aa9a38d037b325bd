//! Frame orchestrator: acquire → record → submit → present, and the per-frame
//! command buffer / semaphore / fence bookkeeping that makes overlap safe.
//!
//! Grounded on `vk_sync.c`'s flat `image_available_semaphores[MAX_FRAMES_IN_FLIGHT]` /
//! `in_flight_fences[MAX_FRAMES_IN_FLIGHT]` / `render_finished_semaphores[SWAPCHAIN_IMAGE_COUNT]`
//! arrays and `vulkan_renderer_frame_begin`/`frame_end` in `vk_renderer.c`. The simpler
//! fixed-array design is kept over `wgpu-hal`'s `Fence` enum (timeline vs. pool) since
//! both `MAX_FRAMES_IN_FLIGHT` and `SWAPCHAIN_IMAGE_COUNT` are spec-fixed constants.

use ash::vk;
use rhi_hal::{AcquiredImage, Device, Queue, Swapchain};
use rhi_types::{MAX_FRAMES_IN_FLIGHT, SWAPCHAIN_IMAGE_COUNT};

use crate::error::RhiError;

struct PerFrame {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    in_flight_fence: vk::Fence,
}

/// Handed to the caller by [`FrameOrchestrator::begin_frame`]; wraps the command buffer
/// already reset and in the recording state, plus the swapchain image index to render
/// into and present.
pub struct FrameContext {
    pub frame_index: usize,
    pub image_index: u32,
    pub command_buffer: vk::CommandBuffer,
    pub suboptimal: bool,
}

pub struct FrameOrchestrator {
    frames: [PerFrame; MAX_FRAMES_IN_FLIGHT],
    render_finished: Vec<vk::Semaphore>,
    current_frame: usize,
}

impl FrameOrchestrator {
    pub fn new(device: &Device, graphics_queue_family: u32) -> Result<Self, RhiError> {
        let frames: Vec<PerFrame> = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| create_per_frame(device, graphics_queue_family))
            .collect::<Result<_, RhiError>>()?;
        let frames: [PerFrame; MAX_FRAMES_IN_FLIGHT] = frames
            .try_into()
            .unwrap_or_else(|_| panic!("MAX_FRAMES_IN_FLIGHT mismatch"));

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let render_finished = (0..SWAPCHAIN_IMAGE_COUNT)
            .map(|_| unsafe { device.raw().create_semaphore(&semaphore_info, None) })
            .collect::<Result<_, _>>()
            .map_err(rhi_hal::DeviceError::from)?;

        log::info!("frame orchestrator ready: {MAX_FRAMES_IN_FLIGHT} frames in flight, {SWAPCHAIN_IMAGE_COUNT} swapchain images");

        Ok(Self {
            frames,
            render_finished,
            current_frame: 0,
        })
    }

    /// Waits for this frame's slot to be free, acquires the next swapchain image, and
    /// resets/begins its command buffer. Returns `Ok(None)` if the swapchain is out of
    /// date and must be recreated before rendering can continue.
    pub fn begin_frame(&mut self, device: &Device, swapchain: &Swapchain) -> Result<Option<FrameContext>, RhiError> {
        let frame = &self.frames[self.current_frame];
        unsafe {
            device
                .raw()
                .wait_for_fences(&[frame.in_flight_fence], true, u64::MAX)
        }
        .map_err(rhi_hal::DeviceError::from)?;

        let acquired = match swapchain
            .acquire_next_image(frame.image_available)
            .map_err(RhiError::Device)?
        {
            Some(acquired) => acquired,
            None => return Ok(None),
        };
        let AcquiredImage { index, suboptimal } = acquired;

        unsafe { device.raw().reset_fences(&[frame.in_flight_fence]) }.map_err(rhi_hal::DeviceError::from)?;
        unsafe {
            device
                .raw()
                .reset_command_buffer(frame.command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(rhi_hal::DeviceError::from)?;

        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe { device.raw().begin_command_buffer(frame.command_buffer, &begin_info) }
            .map_err(rhi_hal::DeviceError::from)?;

        Ok(Some(FrameContext {
            frame_index: self.current_frame,
            image_index: index,
            command_buffer: frame.command_buffer,
            suboptimal,
        }))
    }

    /// Ends recording, submits against this frame's in-flight fence, and presents the
    /// image, signaling the per-image `render_finished` semaphore the original engine
    /// keyed by swapchain image rather than by frame-in-flight slot (a present can
    /// legitimately outlive the CPU frame that produced it).
    pub fn end_frame(
        &mut self,
        device: &Device,
        queue: &Queue,
        swapchain: &Swapchain,
        ctx: FrameContext,
    ) -> Result<bool, RhiError> {
        unsafe { device.raw().end_command_buffer(ctx.command_buffer) }.map_err(rhi_hal::DeviceError::from)?;

        let frame = &self.frames[ctx.frame_index];
        let render_finished = self.render_finished[ctx.image_index as usize];

        queue
            .submit(
                device.raw(),
                ctx.command_buffer,
                frame.image_available,
                render_finished,
                frame.in_flight_fence,
            )
            .map_err(RhiError::Device)?;

        let suboptimal = swapchain
            .present(queue.raw, render_finished, ctx.image_index)
            .map_err(RhiError::Device)?;

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(suboptimal || ctx.suboptimal)
    }

    /// Waits for every in-flight fence so swapchain/image resources referenced by
    /// still-pending command buffers are safe to destroy.
    pub fn wait_all_frames(&self, device: &Device) -> Result<(), RhiError> {
        let fences: Vec<_> = self.frames.iter().map(|f| f.in_flight_fence).collect();
        unsafe { device.raw().wait_for_fences(&fences, true, u64::MAX) }.map_err(rhi_hal::DeviceError::from)?;
        Ok(())
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe {
            for frame in &self.frames {
                device.raw().destroy_semaphore(frame.image_available, None);
                device.raw().destroy_fence(frame.in_flight_fence, None);
                device.raw().destroy_command_pool(frame.command_pool, None);
            }
            for semaphore in self.render_finished.drain(..) {
                device.raw().destroy_semaphore(semaphore, None);
            }
        }
    }
}

fn create_per_frame(device: &Device, graphics_queue_family: u32) -> Result<PerFrame, RhiError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(graphics_queue_family);
    let command_pool = unsafe { device.raw().create_command_pool(&pool_info, None) }
        .map_err(rhi_hal::DeviceError::from)?;

    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let command_buffer = unsafe { device.raw().allocate_command_buffers(&alloc_info) }
        .map_err(rhi_hal::DeviceError::from)?[0];

    let semaphore_info = vk::SemaphoreCreateInfo::default();
    let image_available = unsafe { device.raw().create_semaphore(&semaphore_info, None) }
        .map_err(rhi_hal::DeviceError::from)?;

    // SIGNALED so the first `wait_for_fences` call doesn't block forever.
    let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
    let in_flight_fence = unsafe { device.raw().create_fence(&fence_info, None) }
        .map_err(rhi_hal::DeviceError::from)?;

    Ok(PerFrame {
        command_pool,
        command_buffer,
        image_available,
        in_flight_fence,
    })
}
