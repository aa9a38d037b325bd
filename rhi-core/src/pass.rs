//! Dynamic-rendering attachment setup and MSAA scratch image lifetime.
//!
//! Grounded on `vk_renderer.c`'s `vulkan_renderer_begin_pass`/`end_pass` (which built
//! classic `VkRenderPass`/`VkFramebuffer` objects) and §4.8's decision to move to
//! `VK_KHR_dynamic_rendering`, dropping both in favor of `vkCmdBeginRendering`.

use ash::vk;
use rhi_hal::Device;
use rhi_types::Format;

use crate::error::RhiError;
use crate::image::{format_to_vk, Image, ImageCreateInfo};

#[derive(Copy, Clone)]
pub struct ColorAttachmentDesc {
    pub format: Format,
    pub load_op: rhi_types::LoadOp,
    pub store_op: rhi_types::StoreOp,
    pub clear: rhi_types::ClearValue,
}

#[derive(Copy, Clone, Debug)]
pub struct DepthAttachmentDesc {
    pub format: Format,
    pub load_op: rhi_types::LoadOp,
    pub store_op: rhi_types::StoreOp,
    pub clear_depth: f32,
}

/// A bound render target configuration: the attachment formats pipelines built against
/// it must declare (via `VkPipelineRenderingCreateInfo`), plus an optional MSAA scratch
/// image recreated lazily when the target size or sample count changes.
pub struct Pass {
    pub width: u32,
    pub height: u32,
    pub enable_msaa: bool,
    pub sample_count: vk::SampleCountFlags,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    msaa_color: Vec<Image>,
    msaa_depth: Option<Image>,
}

impl Pass {
    pub fn new(
        color_attachments: &[ColorAttachmentDesc],
        depth_attachment: Option<DepthAttachmentDesc>,
        width: u32,
        height: u32,
        sample_count: vk::SampleCountFlags,
    ) -> Self {
        Self {
            width,
            height,
            enable_msaa: sample_count != vk::SampleCountFlags::TYPE_1,
            sample_count,
            color_formats: color_attachments.iter().map(|a| format_to_vk(a.format)).collect(),
            depth_format: depth_attachment.map(|a| format_to_vk(a.format)),
            msaa_color: Vec::new(),
            msaa_depth: None,
        }
    }

    /// Ensures scratch MSAA images exist at the current size; cheap no-op once created
    /// unless `on_resize` invalidated them.
    fn ensure_msaa_targets(&mut self, device: &Device, color_attachments: &[ColorAttachmentDesc]) -> Result<(), RhiError> {
        if !self.enable_msaa {
            return Ok(());
        }
        if self.msaa_color.is_empty() {
            for attachment in color_attachments {
                let image = Image::create(
                    device,
                    &ImageCreateInfo {
                        width: self.width,
                        height: self.height,
                        format: attachment.format,
                        image_type: rhi_types::ImageType::D2,
                        sample_count: self.sample_count,
                        tiling: vk::ImageTiling::OPTIMAL,
                        usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
                        memory_usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
                    },
                )?;
                self.msaa_color.push(image);
            }
        }
        if self.msaa_depth.is_none() {
            if let Some(depth_format) = self.depth_format {
                let format = vk_format_to_rhi(depth_format);
                let image = Image::create(
                    device,
                    &ImageCreateInfo {
                        width: self.width,
                        height: self.height,
                        format,
                        image_type: rhi_types::ImageType::D2,
                        sample_count: self.sample_count,
                        tiling: vk::ImageTiling::OPTIMAL,
                        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                        memory_usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
                    },
                )?;
                self.msaa_depth = Some(image);
            }
        }
        Ok(())
    }

    /// Destroys scratch MSAA targets so they get rebuilt at the new size on next use.
    pub fn on_resize(&mut self, device: &Device, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for mut image in self.msaa_color.drain(..) {
            image.destroy(device);
        }
        if let Some(mut depth) = self.msaa_depth.take() {
            depth.destroy(device);
        }
    }

    /// Begins dynamic rendering against `color_targets`/`depth_target` (the swapchain
    /// view and, if present, a depth image owned by the frame orchestrator), resolving
    /// MSAA scratch images into them when `enable_msaa` is set. Color attachments
    /// resolve with `AVERAGE`; depth attachments never resolve, per §4.8.
    pub fn begin(
        &mut self,
        device: &Device,
        cmd: vk::CommandBuffer,
        color_attachments: &[ColorAttachmentDesc],
        color_targets: &[vk::ImageView],
        depth_attachment: Option<DepthAttachmentDesc>,
        depth_target: Option<vk::ImageView>,
    ) -> Result<(), RhiError> {
        self.ensure_msaa_targets(device, color_attachments)?;

        let mut color_infos = Vec::with_capacity(color_attachments.len());
        for (i, (desc, &target)) in color_attachments.iter().zip(color_targets.iter()).enumerate() {
            let mut info = vk::RenderingAttachmentInfo::default()
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(load_op_to_vk(desc.load_op))
                .store_op(store_op_to_vk(desc.store_op))
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: unsafe { desc.clear.color },
                    },
                });
            if self.enable_msaa {
                info = info
                    .image_view(self.msaa_color[i].view)
                    .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                    .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .resolve_image_view(target);
            } else {
                info = info.image_view(target);
            }
            color_infos.push(info);
        }

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: self.width,
                    height: self.height,
                },
            })
            .layer_count(1)
            .color_attachments(&color_infos);

        let depth_info = match (depth_attachment, depth_target) {
            (Some(desc), Some(target)) => {
                let mut info = vk::RenderingAttachmentInfo::default()
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(load_op_to_vk(desc.load_op))
                    .store_op(store_op_to_vk(desc.store_op))
                    .clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: desc.clear_depth,
                            stencil: 0,
                        },
                    });
                if self.enable_msaa {
                    if let Some(depth_image) = &self.msaa_depth {
                        // Depth attachments never resolve (§4.8): RESOLVE_MODE_NONE.
                        info = info.image_view(depth_image.view).resolve_mode(vk::ResolveModeFlags::NONE);
                    }
                } else {
                    info = info.image_view(target);
                }
                Some(info)
            }
            _ => None,
        };
        if let Some(depth_info) = depth_info.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_info);
        }

        unsafe { device.dynamic_rendering().cmd_begin_rendering(cmd, &rendering_info) };
        Ok(())
    }

    pub fn end(&self, device: &Device, cmd: vk::CommandBuffer) {
        unsafe { device.dynamic_rendering().cmd_end_rendering(cmd) };
    }

    pub fn destroy(&mut self, device: &Device) {
        for mut image in self.msaa_color.drain(..) {
            image.destroy(device);
        }
        if let Some(mut depth) = self.msaa_depth.take() {
            depth.destroy(device);
        }
    }
}

fn load_op_to_vk(op: rhi_types::LoadOp) -> vk::AttachmentLoadOp {
    match op {
        rhi_types::LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        rhi_types::LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        rhi_types::LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn store_op_to_vk(op: rhi_types::StoreOp) -> vk::AttachmentStoreOp {
    match op {
        rhi_types::StoreOp::Store => vk::AttachmentStoreOp::STORE,
        rhi_types::StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

fn vk_format_to_rhi(format: vk::Format) -> Format {
    match format {
        vk::Format::D32_SFLOAT => Format::D32Float,
        vk::Format::D24_UNORM_S8_UINT => Format::D24UnormS8Uint,
        _ => Format::D32Float,
    }
}
