//! Typed error taxonomy for the render hardware interface.
//!
//! Replaces the original engine's `LOG_ERROR` + early-`return false` pattern with
//! `Result<T, RhiError>`. Every precondition-violation and capacity-exhaustion
//! variant is additionally raised as a `debug_assert!` at the call site so misuse
//! is caught immediately in development builds without changing release behavior
//! (§7).

use rhi_types::Handle;

#[derive(Debug, thiserror::Error)]
pub enum RhiError {
    /// A handle pointed at an uninitialized slot, or its generation no longer
    /// matches the slot's current generation (use-after-destroy).
    #[error("invalid handle (index {index}, generation {generation})")]
    InvalidHandle { index: u32, generation: u32 },

    /// `create` was called on a slot that is already `Initialized`.
    #[error("resource already initialized")]
    ResourceAlreadyInitialized,

    /// An arena ran out of capacity. Fatal: the original engine aborts here and
    /// this rewrite preserves that severity rather than returning a recoverable
    /// error the caller could plausibly ignore.
    #[error("arena out of memory (requested {requested} bytes, {remaining} remaining)")]
    ArenaOutOfMemory { requested: u64, remaining: u64 },

    /// A fixed-capacity `Pool<T>` has no free slots left.
    #[error("pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    /// A `write` into the staging ring would exceed the current frame's partition.
    #[error("staging allocator overflow (requested {requested}, available {available})")]
    StagingOverflow { requested: u64, available: u64 },

    /// SPIR-V reflection failed to parse a shader module or produced an
    /// interface the pipeline-layout synthesis step could not merge.
    #[error("shader reflection failed: {0}")]
    ReflectionFailed(String),

    /// `group_resource_create` was called against a shader with no reflected
    /// per-material (set 1) descriptor set layout.
    #[error("shader has no per-material descriptor set layout (set 1)")]
    NoGroupDescriptorSetLayout,

    /// A Vulkan device-level call failed (out of memory or lost).
    #[error(transparent)]
    Device(#[from] rhi_hal::DeviceError),

    /// Instance/adapter/surface bring-up failed.
    #[error(transparent)]
    Instance(#[from] rhi_hal::InstanceError),
}

impl RhiError {
    pub fn invalid_handle<T>(handle: Handle<T>) -> Self {
        Self::InvalidHandle {
            index: handle.index(),
            generation: handle.generation(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RhiError>;
