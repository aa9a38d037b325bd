/*! Render hardware interface: a pooled, handle-based Vulkan resource layer.

This crate is the single entry point applications depend on. It re-exports the
pieces that live in separate crates for compilation-unit hygiene:

- `rhi-types` — handles, formats, and the other POD types shared everywhere.
- `rhi-hal` — Vulkan instance/device/surface/swapchain bring-up.
- `rhi-core` — the resource pools, staging ring, shader reflection, and frame
  orchestrator built on top of the HAL.
- `rhi-assets` — tracked-directory asset loading (images, shaders, models).

An application builds a [`Context`] once a window exists, drives it with
`create_*`/`destroy_*` calls and `begin_frame`/`end_frame`, and layers an
[`AssetLibrary`] on top when it wants hot-reloadable content instead of
hand-fed bytes.
*/

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub use rhi_types::{
    align_up, AddressMode, BufferKind, ClearValue, DescriptorKind, FilterMode, Format, Handle,
    ImageType, IndexSize, LoadOp, SamplerDesc, ShaderStateFlags, StoreOp, Vertex,
    MAX_DESCRIPTOR_SETS, MAX_FRAMES_IN_FLIGHT, MAX_PUSH_CONSTANT_SIZE, MAX_SHADER_VARIANTS,
    MIN_STAGING_CAPACITY, SWAPCHAIN_IMAGE_COUNT,
};

pub use rhi_hal::{Adapter, AdapterInfo, Device, DeviceError, DeviceType, Instance, InstanceError};

pub use rhi_core::{
    bind_sets, push_constants, BindingDescriptor, Buffer, ColorAttachmentDesc, Context,
    DepthAttachmentDesc, FrameContext, GlobalResource, GroupResource, Image, ImageCreateInfo, Pass,
    ReflectedShader, ResourceState, RhiConfig, RhiError, Sampler, Shader, ShaderConfig,
    VertexAttribute,
};

pub use rhi_assets::{AssetError, AssetLibrary, AssetType, ImageSource, ModelSource, ShaderSource};

/// Re-exported so callers can build [`RhiConfig`] and raw-window-handle bounds
/// without pinning their own `ash`/`raw-window-handle` versions.
pub use rhi_hal::{ash, vk};
pub use raw_window_handle;

/// 1x1 opaque magenta, the load-failure sentinel named in the error-handling design
/// (§7 category 4): callers that hit a missing file or a decode failure get this
/// back instead of propagating the error, so a broken texture renders as "visibly
/// wrong" rather than stalling the frame.
const SENTINEL_MAGENTA_RGBA8: [u8; 4] = [255, 0, 255, 255];

/// Requests `key` from `library` and uploads it into a freshly created GPU image
/// within `frame`'s recording. On any load failure (untracked key, wrong type,
/// decode failure) this logs a warning and falls back to a 1x1 magenta image
/// instead of propagating the error, matching the asset pipeline's non-fatal
/// load-failure handling.
pub fn load_image_or_sentinel(
    context: &mut Context,
    library: &AssetLibrary,
    key: &str,
    frame: &FrameContext,
) -> Result<Handle<Image>, RhiError> {
    match library.request_image(key) {
        Ok(source) => {
            let handle = context.create_image(ImageCreateInfo {
                width: source.width,
                height: source.height,
                format: Format::Rgba8Unorm,
                image_type: ImageType::D2,
                sample_count: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                memory_usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
            })?;
            context.upload_image(handle, frame, &source.pixels)?;
            Ok(handle)
        }
        Err(err) => {
            log::warn!("'{key}' failed to load ({err}), substituting sentinel image");
            let handle = context.create_image(ImageCreateInfo {
                width: 1,
                height: 1,
                format: Format::Rgba8Unorm,
                image_type: ImageType::D2,
                sample_count: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                memory_usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
            })?;
            context.upload_image(handle, frame, &SENTINEL_MAGENTA_RGBA8)?;
            Ok(handle)
        }
    }
}
