use ash::vk;

use crate::error::DeviceError;

/// Thin wrapper around a raw `VkQueue`. Submission and presentation both take
/// explicit semaphore/fence arguments rather than tracking relay state
/// internally (the frame orchestrator in `rhi-core` already owns the
/// per-frame semaphore/fence arrays per §4.9, so there is nothing left for
/// this type to own beyond the handle).
pub struct Queue {
    pub raw: vk::Queue,
}

impl Queue {
    pub fn new(raw: vk::Queue) -> Self {
        Self { raw }
    }

    /// Submits `command_buffer`, waiting on `wait_semaphore` at
    /// `COLOR_ATTACHMENT_OUTPUT` and signalling `signal_semaphore`, fenced by `fence`.
    /// Matches `Vulkan_renderer_frame_end`'s `VkSubmitInfo`.
    pub fn submit(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        wait_semaphore: vk::Semaphore,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<(), DeviceError> {
        let wait = [wait_semaphore];
        let signal = [signal_semaphore];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&buffers)
            .signal_semaphores(&signal);
        unsafe { device.queue_submit(self.raw, &[submit_info], fence) }.map_err(DeviceError::from)
    }
}
