use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::InstanceError;
use crate::instance::Instance;

/// A `VkSurfaceKHR` plus the loader needed to query its capabilities. Wrapped
/// separately from [`crate::Swapchain`] because the surface outlives
/// `on_resize`-driven swapchain recreation.
pub struct Surface {
    instance: Arc<Instance>,
    pub(crate) loader: ash::khr::surface::Instance,
    pub(crate) raw: vk::SurfaceKHR,
}

impl Surface {
    pub(crate) fn new(
        instance: Arc<Instance>,
        window: &(impl HasDisplayHandle + HasWindowHandle),
    ) -> Result<Self, InstanceError> {
        let loader = ash::khr::surface::Instance::new(&instance.entry, &instance.raw);
        let raw = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.raw,
                window.display_handle().unwrap().as_raw(),
                window.window_handle().unwrap().as_raw(),
                None,
            )
        }?;
        Ok(Self {
            instance,
            loader,
            raw,
        })
    }

    pub(crate) fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool, InstanceError> {
        Ok(unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                self.raw,
            )
        }?)
    }

    pub(crate) fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, InstanceError> {
        Ok(unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.raw)
        }?)
    }

    pub(crate) fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, InstanceError> {
        Ok(unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.raw)
        }?)
    }

    pub(crate) fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, InstanceError> {
        Ok(unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.raw)
        }?)
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.raw, None) };
    }
}
