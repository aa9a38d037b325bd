use ash::vk;
use rhi_hal::Device;
use rhi_types::{AddressMode, FilterMode, SamplerDesc};

use crate::error::RhiError;
use crate::image::ResourceState;

pub struct Sampler {
    pub state: ResourceState,
    pub handle: vk::Sampler,
    pub desc: SamplerDesc,
}

fn filter_to_vk(filter: FilterMode) -> vk::Filter {
    match filter {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

fn mipmap_mode_to_vk(filter: FilterMode) -> vk::SamplerMipmapMode {
    match filter {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

impl Sampler {
    pub fn create(device: &Device, desc: SamplerDesc) -> Result<Self, RhiError> {
        let mut create_info = vk::SamplerCreateInfo::default()
            .min_filter(filter_to_vk(desc.min_filter))
            .mag_filter(filter_to_vk(desc.mag_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mip_filter))
            .address_mode_u(address_mode_to_vk(desc.address_mode_u))
            .address_mode_v(address_mode_to_vk(desc.address_mode_v))
            .address_mode_w(address_mode_to_vk(desc.address_mode_w))
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        if let Some(anisotropy) = desc.max_anisotropy {
            create_info = create_info
                .anisotropy_enable(true)
                .max_anisotropy(anisotropy);
        }
        let handle = unsafe { device.raw().create_sampler(&create_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;
        Ok(Self {
            state: ResourceState::Initialized,
            handle,
            desc,
        })
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe { device.raw().destroy_sampler(self.handle, None) };
        self.state = ResourceState::Uninitialized;
    }
}
