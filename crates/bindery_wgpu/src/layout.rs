//! Bind Group Layout
//!
//! One layout covers every descriptor-key slot:
//!
//! | Binding | Resource |
//! |---------|----------|
//! | `0..8` | uniform buffer slot `n` |
//! | `8 + 2n` | texture of sampler slot `n` |
//! | `8 + 2n + 1` | sampler of sampler slot `n` |
//!
//! Every binding is always populated; unbound slots get the factory's
//! placeholder buffer, texture or sampler.

use bindery_core::key::{SAMPLER_BINDING_COUNT, UNIFORM_BUFFER_BINDING_COUNT};

/// Shader-visible binding of uniform buffer `slot`.
#[inline]
#[must_use]
pub const fn uniform_binding(slot: usize) -> u32 {
    slot as u32
}

/// Shader-visible binding of the texture in sampler `slot`.
#[inline]
#[must_use]
pub const fn texture_binding(slot: usize) -> u32 {
    (UNIFORM_BUFFER_BINDING_COUNT + 2 * slot) as u32
}

/// Shader-visible binding of the sampler in sampler `slot`.
#[inline]
#[must_use]
pub const fn sampler_binding(slot: usize) -> u32 {
    texture_binding(slot) + 1
}

const VISIBILITY: wgpu::ShaderStages = wgpu::ShaderStages::VERTEX_FRAGMENT;

pub(crate) fn bind_group_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(UNIFORM_BUFFER_BINDING_COUNT + 2 * SAMPLER_BINDING_COUNT);

    for slot in 0..UNIFORM_BUFFER_BINDING_COUNT {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: uniform_binding(slot),
            visibility: VISIBILITY,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    for slot in 0..SAMPLER_BINDING_COUNT {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: texture_binding(slot),
            visibility: VISIBILITY,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: sampler_binding(slot),
            visibility: VISIBILITY,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn bindings_are_unique_and_dense() {
        let entries = bind_group_layout_entries();
        let bindings: HashSet<u32> = entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings.len(), entries.len());
        assert_eq!(
            bindings.iter().max().copied(),
            Some((entries.len() - 1) as u32)
        );
        assert_eq!(sampler_binding(0), 9);
    }
}
