use ash::vk;

/// Failure creating or losing an `ash::Instance`.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("failed to load the Vulkan loader")]
    LoadingFailed(#[source] ash::LoadingError),
    #[error("no suitable physical device found")]
    NoAdapter,
    #[error(transparent)]
    Vulkan(#[from] vk::Result),
}

/// Failure from a device-level Vulkan call. Every `vk::Result` that reaches this
/// crate's boundary is mapped into one of these two buckets; anything that isn't
/// obviously an allocation failure is logged and folded into `Lost`, mirroring
/// how the original engine treated any unexpected `VkResult` as unrecoverable.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    Lost,
}

impl From<vk::Result> for DeviceError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            vk::Result::ERROR_DEVICE_LOST => Self::Lost,
            other => {
                log::warn!("unexpected Vulkan error, treating as device lost: {other:?}");
                Self::Lost
            }
        }
    }
}
