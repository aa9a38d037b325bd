//! Resource registry and frame orchestration for the render hardware interface.
//!
//! `rhi-hal` owns Vulkan bring-up (instance/device/surface/swapchain); this crate
//! owns everything built on top of it: the generation-checked resource pools, the
//! arena/hash-trie utilities backing them, the staging ring, shader reflection and
//! pipeline-variant cache, descriptor binding, dynamic-rendering passes, and the
//! frame orchestrator tying acquire/record/submit/present together (§2, §4).

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod arena;
pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod hash_trie;
pub mod image;
pub mod pass;
pub mod pool;
pub mod sampler;
pub mod shader;
pub mod staging;

pub use arena::{scratch_begin, scratch_end, scratch_push, Arena, ArenaTemp, ScratchGuard};
pub use buffer::Buffer;
pub use context::{Context, RhiConfig};
pub use descriptor::{bind_sets, push_constants, BindingDescriptor, GlobalResource, GroupResource};
pub use error::{RhiError, Result};
pub use frame::{FrameContext, FrameOrchestrator};
pub use hash_trie::{hash64, HashTrie};
pub use image::{format_to_vk, Image, ImageCreateInfo, ResourceState};
pub use pass::{ColorAttachmentDesc, DepthAttachmentDesc, Pass};
pub use pool::Pool;
pub use sampler::Sampler;
pub use shader::{ReflectedShader, Shader, ShaderConfig, VertexAttribute};
pub use staging::StagingAllocator;
