use std::sync::Arc;

use ash::vk;

use crate::error::InstanceError;
use crate::instance::Instance;
use crate::surface::Surface;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl From<vk::PhysicalDeviceType> for DeviceType {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::Virtual,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: DeviceType,
    pub driver_version: u32,
    pub api_version: u32,
}

/// A scored, not-yet-opened physical device. `rhi-info adapters` and
/// `Instance::enumerate_adapters` both stop here; opening the logical device
/// happens in [`crate::Device::new`].
pub struct Adapter {
    instance: Arc<Instance>,
    pub(crate) physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
}

impl Adapter {
    pub(crate) fn new(instance: Arc<Instance>, physical_device: vk::PhysicalDevice) -> Self {
        let properties = unsafe {
            instance
                .raw()
                .get_physical_device_properties(physical_device)
        };
        Self {
            instance,
            physical_device,
            properties,
        }
    }

    pub fn info(&self) -> AdapterInfo {
        let name = unsafe { std::ffi::CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        AdapterInfo {
            name,
            device_type: self.properties.device_type.into(),
            driver_version: self.properties.driver_version,
            api_version: self.properties.api_version,
        }
    }

    pub fn limits(&self) -> vk::PhysicalDeviceLimits {
        self.properties.limits
    }

    /// Higher is more preferred. Discrete GPUs rank above integrated above everything
    /// else; ties broken by reported `maxImageDimension2D` as a rough capability proxy.
    pub fn score(&self) -> u32 {
        let type_score = match DeviceType::from(self.properties.device_type) {
            DeviceType::Discrete => 3_000_000,
            DeviceType::Integrated => 2_000_000,
            DeviceType::Virtual => 1_000_000,
            DeviceType::Cpu | DeviceType::Other => 0,
        };
        type_score + self.properties.limits.max_image_dimension2_d
    }

    /// Finds a queue family index supporting graphics + transfer, and a present-capable
    /// one for `surface` (which may be the same index). Returns
    /// `(graphics_family, present_family)`.
    pub fn queue_families(
        &self,
        surface: &Surface,
    ) -> Result<(u32, u32), InstanceError> {
        let families = unsafe {
            self.instance
                .raw()
                .get_physical_device_queue_family_properties(self.physical_device)
        };

        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }
            let supports_present = surface.supports_present(self.physical_device, index)?;
            if supports_present && (present.is_none() || present == graphics) {
                present = Some(index);
            }
        }

        match (graphics, present) {
            (Some(g), Some(p)) => Ok((g, p)),
            _ => Err(InstanceError::NoAdapter),
        }
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }
}
