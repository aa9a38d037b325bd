//! Maintainer-facing diagnostic tool: lists Vulkan adapters and runs shader
//! reflection standalone, without standing up a full [`rhi_core::Context`].

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rhi_hal::Instance;

#[derive(Parser)]
#[command(name = "rhi-info", about = "Diagnostics for the render hardware interface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate Vulkan physical devices visible to this machine.
    Adapters,
    /// Reflect a compiled vertex/fragment SPIR-V pair and print the merged layout.
    Reflect {
        vertex_spv: PathBuf,
        fragment_spv: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Adapters => print_adapters(),
        Command::Reflect { vertex_spv, fragment_spv } => print_reflection(&vertex_spv, &fragment_spv),
    }
}

fn print_adapters() -> Result<()> {
    let instance = Instance::new_headless(false).context("failed to create Vulkan instance")?;
    let adapters = instance
        .enumerate_adapters()
        .context("failed to enumerate physical devices")?;

    for (index, adapter) in adapters.iter().enumerate() {
        let info = adapter.info();
        println!("{index}: {}", info.name);
        println!("    type:           {:?}", info.device_type);
        println!("    driver version: {:#x}", info.driver_version);
        println!("    api version:    {:#x}", info.api_version);
    }
    if adapters.is_empty() {
        println!("no Vulkan-capable adapters found");
    }
    Ok(())
}

/// A single stage's descriptor binding, merged across stages by `(set, binding)`.
struct Binding {
    set: u32,
    binding: u32,
    descriptor_type: spirv_reflect::types::ReflectDescriptorType,
    count: u32,
    stages: Vec<&'static str>,
}

/// Standalone re-implementation of `rhi_core::shader`'s reflection merge (§4.6 step
/// 2), printing what it finds instead of building Vulkan descriptor set layouts —
/// this binary never opens a device, so it can run without a GPU present.
fn print_reflection(vertex_path: &PathBuf, fragment_path: &PathBuf) -> Result<()> {
    let vertex_spv = read_spv(vertex_path)?;
    let fragment_spv = read_spv(fragment_path)?;

    let vertex_module = spirv_reflect::ShaderModule::load_u32_data(&vertex_spv)
        .map_err(|e| anyhow::anyhow!("failed to reflect vertex shader: {e}"))?;
    let fragment_module = spirv_reflect::ShaderModule::load_u32_data(&fragment_spv)
        .map_err(|e| anyhow::anyhow!("failed to reflect fragment shader: {e}"))?;

    println!("vertex input layout:");
    let mut inputs = vertex_module
        .enumerate_input_variables(None)
        .map_err(|e| anyhow::anyhow!("failed to read vertex inputs: {e}"))?;
    inputs.retain(|v| v.location != u32::MAX);
    inputs.sort_by_key(|v| v.location);
    let mut offset = 0u32;
    for input in &inputs {
        let format = rhi_hal::vk::Format::from_raw(input.format as i32);
        println!("    location {} : {:?} @ offset {}", input.location, format, offset);
        offset += format_byte_size(format);
    }
    println!("    stride: {offset}");

    let mut bindings: Vec<Binding> = Vec::new();
    for (module, stage_name) in [(&vertex_module, "VERTEX"), (&fragment_module, "FRAGMENT")] {
        let reflected = module
            .enumerate_descriptor_bindings(None)
            .map_err(|e| anyhow::anyhow!("failed to read descriptor bindings: {e}"))?;
        for binding in reflected {
            if let Some(existing) = bindings
                .iter_mut()
                .find(|b| b.set == binding.set && b.binding == binding.binding)
            {
                existing.stages.push(stage_name);
            } else {
                bindings.push(Binding {
                    set: binding.set,
                    binding: binding.binding,
                    descriptor_type: binding.descriptor_type,
                    count: binding.count.max(1),
                    stages: vec![stage_name],
                });
            }
        }
    }
    bindings.sort_by_key(|b| (b.set, b.binding));

    println!("descriptor set layouts:");
    let mut current_set = None;
    for binding in &bindings {
        if current_set != Some(binding.set) {
            println!("  set {}:", binding.set);
            current_set = Some(binding.set);
        }
        println!(
            "    binding {}: {:?} x{} ({})",
            binding.binding,
            binding.descriptor_type,
            binding.count,
            binding.stages.join("|")
        );
    }

    let push_constant_size = [&vertex_module, &fragment_module]
        .iter()
        .flat_map(|module| module.enumerate_push_constant_blocks(None).unwrap_or_default())
        .map(|block| block.size)
        .max()
        .unwrap_or(0);
    if push_constant_size > 0 {
        println!("push constants: offset 0 size {push_constant_size}");
    } else {
        println!("push constants: none");
    }

    Ok(())
}

fn format_byte_size(format: rhi_hal::vk::Format) -> u32 {
    match format {
        rhi_hal::vk::Format::R32_SFLOAT | rhi_hal::vk::Format::R32_UINT | rhi_hal::vk::Format::R32_SINT => 4,
        rhi_hal::vk::Format::R32G32_SFLOAT => 8,
        rhi_hal::vk::Format::R32G32B32_SFLOAT => 12,
        rhi_hal::vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 16,
    }
}

fn read_spv(path: &PathBuf) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes(chunk.try_into().unwrap()))
        .collect())
}
