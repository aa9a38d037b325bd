//! SPIR-V reflection and the bounded, LRU-evicted graphics-pipeline-variant cache.
//!
//! Grounded on `vk_internal.h`'s `vulkan_shader { ... VulkanPipeline variants[MAX_SHADER_VARIANTS];
//! ... pipeline_lru_head/pipeline_root }` and §4.6. Reflection itself has no analog in
//! the original C engine (it hand-wrote vertex layouts); `spirv-reflect` is sourced
//! from the reference pack (`other_examples/manifests/TableauBits-morrigu-rs/Cargo.toml`)
//! to cover it.

use std::collections::HashMap;

use ash::vk;
use rhi_hal::Device;
use rhi_types::{ShaderStateFlags, MAX_PUSH_CONSTANT_SIZE, MAX_SHADER_VARIANTS};

use crate::error::RhiError;
use crate::image::ResourceState;
use crate::pass::Pass;

#[derive(Copy, Clone, Debug)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: vk::Format,
    pub offset: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct SetBindingKey {
    set: u32,
    binding: u32,
}

#[derive(Clone, Debug)]
struct MergedBinding {
    descriptor_type: vk::DescriptorType,
    count: u32,
    stage_flags: vk::ShaderStageFlags,
    /// Reflected UBO block size in bytes (`ReflectBlockVariable::size`), zero for
    /// non-buffer bindings. Used to derive `ReflectedShader::instance_size`.
    block_size: u32,
}

pub struct ReflectedShader {
    pub vertex_attributes: Vec<VertexAttribute>,
    pub vertex_stride: u32,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_range: Option<vk::PushConstantRange>,
    /// Binding number of the per-material (set 1) UBO, if reflected.
    pub group_ubo_binding: Option<u32>,
    pub instance_size: u32,
}

/// A cached graphics pipeline specialized for one `ShaderStateFlags` bitmask.
struct PipelineVariant {
    handle: vk::Pipeline,
}

pub struct Shader {
    pub state: ResourceState,
    pub vertex_module: vk::ShaderModule,
    pub fragment_module: vk::ShaderModule,
    pub reflected: ReflectedShader,
    pub pipeline_layout: vk::PipelineLayout,
    variants: HashMap<ShaderStateFlags, PipelineVariant>,
    /// Least-recently-used at the front, most-recently-used at the back. A flat
    /// `Vec` stands in for the original's intrusive doubly-linked list — with a
    /// cache bound of `MAX_SHADER_VARIANTS` (8), a linear scan costs nothing and
    /// Rust has no sound way to keep raw prev/next pointers into a `HashMap`.
    lru: Vec<ShaderStateFlags>,
}

pub struct ShaderConfig<'a> {
    pub vertex_spv: &'a [u32],
    pub fragment_spv: &'a [u32],
}

impl Shader {
    pub fn create(device: &Device, config: &ShaderConfig) -> Result<Self, RhiError> {
        let vertex_module = create_shader_module(device, config.vertex_spv)?;
        let fragment_module = create_shader_module(device, config.fragment_spv)?;

        let vertex_reflection = reflect(config.vertex_spv, vk::ShaderStageFlags::VERTEX)?;
        let fragment_reflection = reflect(config.fragment_spv, vk::ShaderStageFlags::FRAGMENT)?;

        let reflected = merge_reflections(device, vertex_reflection, fragment_reflection)?;

        let set_layouts_refs: Vec<_> = reflected.set_layouts.clone();
        let mut layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts_refs);
        let ranges = reflected.push_constant_range.map(|r| [r]);
        if let Some(ranges) = ranges.as_ref() {
            layout_info = layout_info.push_constant_ranges(ranges);
        }
        let pipeline_layout = unsafe { device.raw().create_pipeline_layout(&layout_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;

        log::debug!("shader created: {} reflected descriptor sets", reflected.set_layouts.len());

        Ok(Self {
            state: ResourceState::Initialized,
            vertex_module,
            fragment_module,
            reflected,
            pipeline_layout,
            variants: HashMap::new(),
            lru: Vec::new(),
        })
    }

    pub fn destroy(&mut self, device: &Device) {
        unsafe {
            for variant in self.variants.values() {
                device.raw().destroy_pipeline(variant.handle, None);
            }
            device.raw().destroy_pipeline_layout(self.pipeline_layout, None);
            device.raw().destroy_shader_module(self.vertex_module, None);
            device.raw().destroy_shader_module(self.fragment_module, None);
        }
        self.variants.clear();
        self.lru.clear();
        self.state = ResourceState::Uninitialized;
    }

    /// Looks up (or builds and caches) the pipeline for `flags` against the
    /// currently-bound `pass`, evicting the least-recently-used variant when the
    /// cache would exceed `MAX_SHADER_VARIANTS`.
    pub fn pipeline_for(
        &mut self,
        device: &Device,
        flags: ShaderStateFlags,
        pass: &Pass,
    ) -> Result<vk::Pipeline, RhiError> {
        if self.variants.contains_key(&flags) {
            self.touch_lru(flags);
            return Ok(self.variants[&flags].handle);
        }

        let handle = build_pipeline(device, self, flags, pass)?;
        self.variants.insert(flags, PipelineVariant { handle });
        self.lru.push(flags);

        if self.lru.len() > MAX_SHADER_VARIANTS {
            let evicted = self.lru.remove(0);
            if let Some(variant) = self.variants.remove(&evicted) {
                unsafe { device.raw().destroy_pipeline(variant.handle, None) };
            }
            log::debug!("evicted pipeline variant {evicted:?} (cache at capacity)");
        }

        Ok(handle)
    }

    fn touch_lru(&mut self, flags: ShaderStateFlags) {
        if let Some(pos) = self.lru.iter().position(|&f| f == flags) {
            let flags = self.lru.remove(pos);
            self.lru.push(flags);
        }
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

fn create_shader_module(device: &Device, spv: &[u32]) -> Result<vk::ShaderModule, RhiError> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(spv);
    unsafe { device.raw().create_shader_module(&create_info, None) }
        .map_err(|e| RhiError::Device(rhi_hal::DeviceError::from(e)))
}

struct StageReflection {
    stage: vk::ShaderStageFlags,
    inputs: Vec<VertexAttribute>,
    bindings: HashMap<SetBindingKey, MergedBinding>,
    push_constant_size: u32,
}

fn reflect(spv: &[u32], stage: vk::ShaderStageFlags) -> Result<StageReflection, RhiError> {
    let module = spirv_reflect::ShaderModule::load_u32_data(spv)
        .map_err(|e| RhiError::ReflectionFailed(e.to_string()))?;

    let mut inputs = Vec::new();
    if stage == vk::ShaderStageFlags::VERTEX {
        let mut variables = module
            .enumerate_input_variables(None)
            .map_err(|e| RhiError::ReflectionFailed(e.to_string()))?;
        // Built-ins (gl_VertexIndex etc.) carry location u32::MAX in spirv-reflect; skip them.
        variables.retain(|v| v.location != u32::MAX);
        variables.sort_by_key(|v| v.location);
        let mut offset = 0u32;
        for variable in &variables {
            let format = vk::Format::from_raw(variable.format as i32);
            let size = reflect_format_size(format);
            inputs.push(VertexAttribute {
                location: variable.location,
                format,
                offset,
            });
            offset += size;
        }
    }

    let mut bindings = HashMap::new();
    let descriptor_sets = module
        .enumerate_descriptor_bindings(None)
        .map_err(|e| RhiError::ReflectionFailed(e.to_string()))?;
    for binding in descriptor_sets {
        let key = SetBindingKey {
            set: binding.set,
            binding: binding.binding,
        };
        let descriptor_type = descriptor_type_from_reflect(binding.descriptor_type);
        bindings.insert(
            key,
            MergedBinding {
                descriptor_type,
                count: binding.count.max(1),
                stage_flags: stage,
                block_size: binding.block.size,
            },
        );
    }

    let push_constant_size = module
        .enumerate_push_constant_blocks(None)
        .map_err(|e| RhiError::ReflectionFailed(e.to_string()))?
        .iter()
        .map(|block| block.size)
        .max()
        .unwrap_or(0);

    Ok(StageReflection {
        stage,
        inputs,
        bindings,
        push_constant_size,
    })
}

fn merge_reflections(
    device: &Device,
    vertex: StageReflection,
    fragment: StageReflection,
) -> Result<ReflectedShader, RhiError> {
    let vertex_stride = vertex.inputs.iter().map(|a| a.offset + format_byte_size(a.format)).max().unwrap_or(0);

    let mut merged: HashMap<SetBindingKey, MergedBinding> = vertex.bindings;
    for (key, binding) in fragment.bindings {
        merged
            .entry(key)
            .and_modify(|existing| existing.stage_flags |= binding.stage_flags)
            .or_insert(binding);
    }

    let max_set = merged.keys().map(|k| k.set).max().map(|m| m + 1).unwrap_or(0);
    let mut set_layouts = Vec::with_capacity(max_set as usize);
    let mut group_ubo_binding = None;
    let mut instance_size = 0u32;

    for set_index in 0..max_set {
        let bindings: Vec<_> = merged
            .iter()
            .filter(|(key, _)| key.set == set_index)
            .map(|(key, binding)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(key.binding)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stage_flags)
            })
            .collect();

        if set_index == 1 {
            if let Some((key, binding)) = merged
                .iter()
                .find(|(key, binding)| key.set == 1 && binding.descriptor_type == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            {
                group_ubo_binding = Some(key.binding);
                instance_size = binding.block_size;
            }
        }

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { device.raw().create_descriptor_set_layout(&layout_info, None) }
            .map_err(rhi_hal::DeviceError::from)?;
        set_layouts.push(layout);
    }

    let push_constant_size = vertex
        .push_constant_size
        .max(fragment.push_constant_size)
        .min(MAX_PUSH_CONSTANT_SIZE);
    let push_constant_range = if push_constant_size > 0 {
        Some(
            vk::PushConstantRange::default()
                .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)
                .offset(0)
                .size(push_constant_size),
        )
    } else {
        None
    };

    let _ = fragment.stage;
    let _ = vertex.stage;

    Ok(ReflectedShader {
        vertex_attributes: vertex.inputs,
        vertex_stride,
        set_layouts,
        push_constant_range,
        group_ubo_binding,
        instance_size,
    })
}

fn reflect_format_size(format: vk::Format) -> u32 {
    format_byte_size(format)
}

fn format_byte_size(format: vk::Format) -> u32 {
    match format {
        vk::Format::R32_SFLOAT | vk::Format::R32_UINT | vk::Format::R32_SINT => 4,
        vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 16,
    }
}

fn descriptor_type_from_reflect(ty: spirv_reflect::types::ReflectDescriptorType) -> vk::DescriptorType {
    use spirv_reflect::types::ReflectDescriptorType as R;
    match ty {
        R::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        R::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        R::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        R::Sampler => vk::DescriptorType::SAMPLER,
        R::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        _ => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

fn build_pipeline(
    device: &Device,
    shader: &Shader,
    flags: ShaderStateFlags,
    pass: &Pass,
) -> Result<vk::Pipeline, RhiError> {
    let stage_name = c"main";
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(shader.vertex_module)
            .name(stage_name),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(shader.fragment_module)
            .name(stage_name),
    ];

    let bindings = [vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(shader.reflected.vertex_stride)
        .input_rate(vk::VertexInputRate::VERTEX)];
    let attributes: Vec<_> = shader
        .reflected
        .vertex_attributes
        .iter()
        .map(|a| {
            vk::VertexInputAttributeDescription::default()
                .location(a.location)
                .binding(0)
                .format(a.format)
                .offset(a.offset)
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let topology = if flags.contains(ShaderStateFlags::LINE_LIST) {
        vk::PrimitiveTopology::LINE_LIST
    } else {
        vk::PrimitiveTopology::TRIANGLE_LIST
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let cull_mode = if flags.contains(ShaderStateFlags::CULL_NONE) {
        vk::CullModeFlags::NONE
    } else if flags.contains(ShaderStateFlags::CULL_FRONT) {
        vk::CullModeFlags::FRONT
    } else {
        vk::CullModeFlags::BACK
    };
    let front_face = if flags.contains(ShaderStateFlags::CLOCKWISE) {
        vk::FrontFace::CLOCKWISE
    } else {
        vk::FrontFace::COUNTER_CLOCKWISE
    };
    let polygon_mode = if flags.contains(ShaderStateFlags::WIREFRAME) {
        vk::PolygonMode::LINE
    } else {
        vk::PolygonMode::FILL
    };
    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(polygon_mode)
        .cull_mode(cull_mode)
        .front_face(front_face)
        .line_width(1.0);

    let sample_count = if pass.enable_msaa {
        pass.sample_count
    } else {
        vk::SampleCountFlags::TYPE_1
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(sample_count);

    let compare_op = if flags.contains(ShaderStateFlags::COMPARE_OP_LESS_OR_EQUAL) {
        vk::CompareOp::LESS_OR_EQUAL
    } else {
        vk::CompareOp::LESS
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(!flags.contains(ShaderStateFlags::DEPTH_TEST_DISABLED))
        .depth_write_enable(!flags.contains(ShaderStateFlags::DEPTH_WRITE_DISABLED))
        .depth_compare_op(compare_op);

    let attachments: Vec<_> = pass
        .color_formats
        .iter()
        .map(|_| {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
        })
        .collect();
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&pass.color_formats)
        .depth_attachment_format(pass.depth_format.unwrap_or(vk::Format::UNDEFINED));

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(shader.pipeline_layout)
        .push_next(&mut rendering_info);

    let pipelines = unsafe {
        device
            .raw()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| RhiError::Device(rhi_hal::DeviceError::from(e)))?;

    log::debug!("pipeline variant built: flags={flags:?}");

    Ok(pipelines[0])
}
