use std::sync::Arc;

use ash::vk;
use gpu_alloc::GpuAllocator;
use gpu_descriptor::DescriptorAllocator;
use parking_lot::Mutex;

use crate::adapter::Adapter;
use crate::error::DeviceError;
use crate::instance::Instance;

const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[
    ash::khr::swapchain::NAME,
    ash::khr::dynamic_rendering::NAME,
];

/// State shared between `Device` and anything that outlives a single frame's
/// command recording (the resource pools in `rhi-core`). Kept in its own `Arc`
/// the way `wgpu-hal`'s `DeviceShared` is, so pooled resources can carry a
/// cheap handle back to the raw device without owning the whole `Device`.
pub struct DeviceShared {
    pub raw: ash::Device,
    pub instance: Arc<Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
    pub dynamic_rendering: ash::khr::dynamic_rendering::Device,
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe { self.raw.destroy_device(None) };
    }
}

/// Owns the logical device plus the two sub-allocators every pooled resource
/// borrows from: `gpu-alloc` for device memory, `gpu-descriptor` for descriptor
/// sets. Both are behind a `Mutex` because `rhi-core` is single-threaded by
/// contract (§5) but the allocator types themselves are `!Sync`.
pub struct Device {
    pub shared: Arc<DeviceShared>,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub mem_allocator: Mutex<GpuAllocator<vk::DeviceMemory>>,
    pub descriptor_allocator: Mutex<DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>>,
}

impl Device {
    pub fn new(adapter: &Adapter, graphics_family: u32, present_family: u32) -> Result<Self, DeviceError> {
        let instance = adapter.instance().clone();
        let raw_instance = instance.raw();

        let mut unique_families = vec![graphics_family];
        if present_family != graphics_family {
            unique_families.push(present_family);
        }
        let priority = [1.0f32];
        let queue_create_infos: Vec<_> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priority)
            })
            .collect();

        let extensions: Vec<*const i8> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();

        let mut dynamic_rendering_features =
            vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features)
            .push_next(&mut dynamic_rendering_features);

        let raw = unsafe {
            raw_instance.create_device(adapter.physical_device(), &create_info, None)
        }
        .map_err(DeviceError::from)?;

        let graphics_queue = unsafe { raw.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { raw.get_device_queue(present_family, 0) };

        let dynamic_rendering = ash::khr::dynamic_rendering::Device::new(raw_instance, &raw);

        let mem_props =
            unsafe { raw_instance.get_physical_device_memory_properties(adapter.physical_device()) };
        let device_props = unsafe {
            gpu_alloc_ash::device_properties(raw_instance, vk::API_VERSION_1_3, adapter.physical_device())
        }
        .map_err(|_| DeviceError::Lost)?;
        let mem_allocator = GpuAllocator::new(gpu_alloc::Config::i_am_prototyping(), device_props);
        let _ = mem_props;

        let descriptor_allocator = DescriptorAllocator::new(0);

        let shared = Arc::new(DeviceShared {
            raw,
            instance,
            physical_device: adapter.physical_device(),
            graphics_queue_family: graphics_family,
            present_queue_family: present_family,
            dynamic_rendering,
        });

        log::info!(
            "Vulkan device created (graphics family {graphics_family}, present family {present_family})"
        );

        Ok(Self {
            shared,
            graphics_queue,
            present_queue,
            mem_allocator: Mutex::new(mem_allocator),
            descriptor_allocator: Mutex::new(descriptor_allocator),
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.shared.raw
    }

    pub fn dynamic_rendering(&self) -> &ash::khr::dynamic_rendering::Device {
        &self.shared.dynamic_rendering
    }

    pub fn wait_idle(&self) -> Result<(), DeviceError> {
        unsafe { self.shared.raw.device_wait_idle() }.map_err(DeviceError::from)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.mem_allocator
                .get_mut()
                .cleanup(gpu_alloc_ash::AshMemoryDevice::wrap(&self.shared.raw));
        }
    }
}
