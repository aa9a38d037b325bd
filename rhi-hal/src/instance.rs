use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::adapter::Adapter;
use crate::error::InstanceError;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::trace!("{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{message}"),
        _ => {}
    }
    vk::FALSE
}

/// Owns the `ash::Entry`/`ash::Instance` pair and, in debug builds, the validation
/// debug-utils messenger. Dropped last among all Vulkan objects.
pub struct Instance {
    pub(crate) entry: ash::Entry,
    pub(crate) raw: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a Vulkan instance requesting the extensions `display` reports as
    /// necessary to present onto it, plus `VK_EXT_debug_utils` and the Khronos
    /// validation layer when `enable_validation` is set.
    pub fn new(
        display: &impl HasDisplayHandle,
        enable_validation: bool,
    ) -> Result<Arc<Self>, InstanceError> {
        let extensions =
            ash_window::enumerate_required_extensions(display.display_handle().unwrap().as_raw())
                .map_err(InstanceError::Vulkan)?
                .to_vec();
        Self::create(extensions, enable_validation)
    }

    /// Creates a Vulkan instance with no window-system extensions, for tooling that
    /// only enumerates adapters or runs shader reflection and never presents.
    pub fn new_headless(enable_validation: bool) -> Result<Arc<Self>, InstanceError> {
        Self::create(Vec::new(), enable_validation)
    }

    fn create(
        mut extensions: Vec<*const i8>,
        enable_validation: bool,
    ) -> Result<Arc<Self>, InstanceError> {
        let entry = unsafe { ash::Entry::load() }.map_err(InstanceError::LoadingFailed)?;

        let app_name = c"rhi";
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut layers: Vec<*const i8> = Vec::new();
        if enable_validation {
            let available = unsafe { entry.enumerate_instance_layer_properties() }?;
            let found = available.iter().any(|layer| {
                let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                name == VALIDATION_LAYER
            });
            if found {
                layers.push(VALIDATION_LAYER.as_ptr());
                extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            } else {
                log::warn!("validation requested but VK_LAYER_KHRONOS_validation is unavailable");
            }
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let raw = unsafe { entry.create_instance(&create_info, None) }?;

        let debug_utils = if enable_validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &raw);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let messenger =
                unsafe { loader.create_debug_utils_messenger(&messenger_info, None) }?;
            Some((loader, messenger))
        } else {
            None
        };

        log::info!("Vulkan instance created (validation: {enable_validation})");

        Ok(Arc::new(Self {
            entry,
            raw,
            debug_utils,
        }))
    }

    /// Enumerates physical devices and scores them with [`Adapter::score`], returning
    /// them in descending-preference order. Callers typically use `[0]`.
    pub fn enumerate_adapters(self: &Arc<Self>) -> Result<Vec<Adapter>, InstanceError> {
        let physical_devices = unsafe { self.raw.enumerate_physical_devices() }?;
        if physical_devices.is_empty() {
            return Err(InstanceError::NoAdapter);
        }
        let mut adapters: Vec<Adapter> = physical_devices
            .into_iter()
            .map(|pd| Adapter::new(self.clone(), pd))
            .collect();
        adapters.sort_by_key(|a| std::cmp::Reverse(a.score()));
        Ok(adapters)
    }

    pub fn create_surface(
        self: &Arc<Self>,
        window: &(impl HasDisplayHandle + HasWindowHandle),
    ) -> Result<crate::Surface, InstanceError> {
        crate::Surface::new(self.clone(), window)
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.raw
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.raw.destroy_instance(None);
        }
    }
}
