/*! Vulkan instance/device bring-up for the render hardware interface.

This crate is deliberately a thin, single-backend layer: it owns the `ash::Entry`/
`ash::Instance`/`ash::Device` lifetime, physical device scoring, queue family
selection, and swapchain wrapping. It does not know about buffers, images, shaders
or render passes as RHI concepts — those are built on top of it in `rhi-core`,
which holds pools of typed resources and only reaches down here for raw Vulkan
handles and allocators.

Unlike the teacher crate this is modeled on, there is no `Api` trait spanning
multiple backends: the render hardware interface targets Vulkan only, so the
indirection buys nothing and was dropped.
*/

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

mod adapter;
mod device;
mod error;
mod instance;
mod queue;
mod surface;
mod swapchain;

pub use adapter::{Adapter, AdapterInfo, DeviceType};
pub use device::{Device, DeviceShared};
pub use error::{DeviceError, InstanceError};
pub use instance::Instance;
pub use queue::Queue;
pub use surface::Surface;
pub use swapchain::{AcquiredImage, Swapchain, SwapchainConfig};

/// Re-exported so downstream crates can speak Vulkan types without a direct `ash` dependency bump mismatch.
pub use ash;
pub use ash::vk;

/// Maximum frames recorded on the host while still GPU-pending; mirrors `rhi_types::MAX_FRAMES_IN_FLIGHT`.
pub const MAX_FRAMES_IN_FLIGHT: usize = rhi_types::MAX_FRAMES_IN_FLIGHT;
