use ash::vk;

use crate::device::Device;
use crate::error::DeviceError;
use crate::surface::Surface;

pub struct SwapchainConfig {
    pub width: u32,
    pub height: u32,
    pub present_mode: vk::PresentModeKHR,
}

pub struct AcquiredImage {
    pub index: u32,
    pub suboptimal: bool,
}

/// Wraps `VkSwapchainKHR` plus its images/views. Mirrors
/// `vk_swapchain.c`'s `vulkan_swapchain_create`/`vulkan_swapchain_recreate`: format
/// prefers `B8G8R8A8_SRGB`/`SRGB_NONLINEAR`, present mode defaults to `FIFO`
/// (always-available, no tearing), image count is clamped to
/// `rhi_types::SWAPCHAIN_IMAGE_COUNT`.
pub struct Swapchain {
    loader: ash::khr::swapchain::Device,
    pub raw: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub fn new(
        device: &Device,
        surface: &Surface,
        config: &SwapchainConfig,
        old: Option<&Swapchain>,
    ) -> Result<Self, DeviceError> {
        let physical_device = device.shared.physical_device;
        let capabilities = surface
            .capabilities(physical_device)
            .map_err(|_| DeviceError::Lost)?;
        let formats = surface.formats(physical_device).map_err(|_| DeviceError::Lost)?;
        let present_modes = surface
            .present_modes(physical_device)
            .map_err(|_| DeviceError::Lost)?;

        let format = select_surface_format(&formats);
        let present_mode = if present_modes.contains(&config.present_mode) {
            config.present_mode
        } else {
            vk::PresentModeKHR::FIFO
        };
        let extent = select_extent(config.width, config.height, &capabilities);

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }
        image_count = image_count.min(rhi_types::SWAPCHAIN_IMAGE_COUNT as u32);

        let families = [
            device.shared.graphics_queue_family,
            device.shared.present_queue_family,
        ];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.raw)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |s| s.raw));

        if families[0] != families[1] {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let loader = ash::khr::swapchain::Device::new(&device.shared.instance.raw(), device.raw());
        let raw = unsafe { loader.create_swapchain(&create_info, None) }.map_err(DeviceError::from)?;
        let images = unsafe { loader.get_swapchain_images(raw) }.map_err(DeviceError::from)?;

        let views = images
            .iter()
            .map(|&image| create_view(device.raw(), image, format.format))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            loader,
            raw,
            format,
            extent,
            images,
            views,
        })
    }

    /// `AcquireNextImageKHR` with an infinite timeout, matching `frame_begin`'s
    /// contract (§4.9): a swapchain caller never busy-polls, it blocks on the
    /// image-available semaphore instead.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> Result<Option<AcquiredImage>, DeviceError> {
        match unsafe {
            self.loader
                .acquire_next_image(self.raw, u64::MAX, semaphore, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => Ok(Some(AcquiredImage { index, suboptimal })),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(other) => Err(DeviceError::from(other)),
        }
    }

    pub fn present(
        &self,
        queue: vk::Queue,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<bool, DeviceError> {
        let wait = [wait_semaphore];
        let swapchains = [self.raw];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(other) => Err(DeviceError::from(other)),
        }
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            for view in self.views {
                device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.raw, None);
        }
    }
}

fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

fn select_extent(width: u32, height: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D { width, height }
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView, DeviceError> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe { device.create_image_view(&create_info, None) }.map_err(DeviceError::from)
}
