//! wgpu Native Factory
//!
//! Implements [`NativeFactory`] on a `wgpu::Device`.
//!
//! # Handles
//!
//! wgpu objects are reference-counted Rust values, not integers, so every
//! object the cache sees is represented by a registry id. The caller registers
//! shader modules, render targets, buffers, texture views and samplers and
//! puts the returned ids into the keys; compiled pipelines and bind groups are
//! registered by the factory itself and fetched back with
//! [`WgpuFactory::pipeline`] / [`WgpuFactory::bind_group`].
//!
//! All ids come from one counter, so ids of different kinds never collide.
//!
//! # Render Targets
//!
//! wgpu has no render-pass objects. The key's render-pass handle names a
//! [`RenderTargetFormats`] entry instead: the attachment formats a pipeline
//! must be compatible with. Subpasses do not exist either; a non-zero subpass
//! fails compilation.

use bindery_cache::{NativeFactory, PipelineLayouts};
use bindery_core::{
    CacheError, DescriptorKey, DescriptorUpdateOp, DescriptorWrite, PipelineKey, RasterState,
    RawHandle, Result, VertexLayout,
    key::{SAMPLER_BINDING_COUNT, UNIFORM_BUFFER_BINDING_COUNT, WHOLE_SIZE},
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::convert;
use crate::layout::{self, sampler_binding, texture_binding, uniform_binding};

/// A shader module plus the entry point a stage uses.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    pub module: wgpu::ShaderModule,
    pub entry_point: String,
}

/// Attachment formats of a render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetFormats {
    pub color: SmallVec<[wgpu::TextureFormat; 4]>,
    pub depth_stencil: Option<wgpu::TextureFormat>,
}

impl RenderTargetFormats {
    #[must_use]
    pub fn new(color: &[wgpu::TextureFormat], depth_stencil: Option<wgpu::TextureFormat>) -> Self {
        Self {
            color: SmallVec::from_slice(color),
            depth_stencil,
        }
    }
}

/// Bound in place of unbound descriptor slots.
struct Placeholders {
    buffer: wgpu::Buffer,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl Placeholders {
    fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bindery Placeholder Uniform"),
            size: 256,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Bindery Placeholder Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bindery Placeholder Sampler"),
            ..Default::default()
        });
        Self {
            buffer,
            view,
            sampler,
        }
    }
}

/// [`NativeFactory`] over a `wgpu::Device`.
pub struct WgpuFactory {
    device: wgpu::Device,
    next_id: u64,
    placeholders: Placeholders,

    // ---- Caller-registered resources ----
    shaders: FxHashMap<RawHandle, ShaderStage>,
    render_targets: FxHashMap<RawHandle, RenderTargetFormats>,
    buffers: FxHashMap<RawHandle, wgpu::Buffer>,
    views: FxHashMap<RawHandle, wgpu::TextureView>,
    samplers: FxHashMap<RawHandle, wgpu::Sampler>,

    // ---- Factory-created objects ----
    bind_group_layouts: FxHashMap<RawHandle, wgpu::BindGroupLayout>,
    pipeline_layouts: FxHashMap<RawHandle, wgpu::PipelineLayout>,
    pipelines: FxHashMap<RawHandle, wgpu::RenderPipeline>,
    bind_groups: FxHashMap<RawHandle, wgpu::BindGroup>,
}

impl WgpuFactory {
    #[must_use]
    pub fn new(device: wgpu::Device) -> Self {
        let placeholders = Placeholders::new(&device);
        Self {
            device,
            next_id: 0,
            placeholders,
            shaders: FxHashMap::default(),
            render_targets: FxHashMap::default(),
            buffers: FxHashMap::default(),
            views: FxHashMap::default(),
            samplers: FxHashMap::default(),
            bind_group_layouts: FxHashMap::default(),
            pipeline_layouts: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            bind_groups: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn allocate_id(&mut self) -> RawHandle {
        self.next_id += 1;
        RawHandle::from_raw(self.next_id)
    }

    // ─── Registration ────────────────────────────────────────────────────────

    pub fn register_shader(
        &mut self,
        module: wgpu::ShaderModule,
        entry_point: impl Into<String>,
    ) -> RawHandle {
        let id = self.allocate_id();
        self.shaders.insert(
            id,
            ShaderStage {
                module,
                entry_point: entry_point.into(),
            },
        );
        id
    }

    pub fn register_render_target(&mut self, formats: RenderTargetFormats) -> RawHandle {
        let id = self.allocate_id();
        self.render_targets.insert(id, formats);
        id
    }

    pub fn register_buffer(&mut self, buffer: wgpu::Buffer) -> RawHandle {
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        id
    }

    pub fn register_texture_view(&mut self, view: wgpu::TextureView) -> RawHandle {
        let id = self.allocate_id();
        self.views.insert(id, view);
        id
    }

    pub fn register_sampler(&mut self, sampler: wgpu::Sampler) -> RawHandle {
        let id = self.allocate_id();
        self.samplers.insert(id, sampler);
        id
    }

    /// Forgets a shader. Cached pipelines built from it stay valid.
    pub fn unregister_shader(&mut self, id: RawHandle) -> Option<wgpu::ShaderModule> {
        self.shaders.remove(&id).map(|stage| stage.module)
    }

    pub fn unregister_render_target(&mut self, id: RawHandle) -> Option<RenderTargetFormats> {
        self.render_targets.remove(&id)
    }

    /// Forgets a buffer. Invalidate it in the cache first.
    pub fn unregister_buffer(&mut self, id: RawHandle) -> Option<wgpu::Buffer> {
        self.buffers.remove(&id)
    }

    /// Forgets a texture view. Invalidate it in the cache first.
    pub fn unregister_texture_view(&mut self, id: RawHandle) -> Option<wgpu::TextureView> {
        self.views.remove(&id)
    }

    pub fn unregister_sampler(&mut self, id: RawHandle) -> Option<wgpu::Sampler> {
        self.samplers.remove(&id)
    }

    // ─── Lookups ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn pipeline(&self, id: RawHandle) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&id)
    }

    #[must_use]
    pub fn bind_group(&self, id: RawHandle) -> Option<&wgpu::BindGroup> {
        self.bind_groups.get(&id)
    }

    #[must_use]
    pub fn pipeline_layout(&self, id: RawHandle) -> Option<&wgpu::PipelineLayout> {
        self.pipeline_layouts.get(&id)
    }

    /// Live pipelines and bind groups created through this factory.
    #[must_use]
    pub fn object_counts(&self) -> (usize, usize) {
        (self.pipelines.len(), self.bind_groups.len())
    }

    // ─── Pipeline Compilation ────────────────────────────────────────────────

    fn shader(&self, id: RawHandle, stage: &str) -> Result<&ShaderStage> {
        self.shaders
            .get(&id)
            .ok_or_else(|| CacheError::compilation(format!("unknown {stage} shader {id:?}")))
    }

    /// Checks what wgpu would otherwise reject through its uncaptured-error
    /// handler.
    fn validate_raster(&self, raster: &RasterState) -> Result<()> {
        let features = self.device.features();
        if raster.depth_clamp() && !features.contains(wgpu::Features::DEPTH_CLIP_CONTROL) {
            return Err(CacheError::compilation(
                "depth clamp requires Features::DEPTH_CLIP_CONTROL",
            ));
        }
        let polygon_feature = match raster.polygon_mode() {
            bindery_core::PolygonMode::Fill => None,
            bindery_core::PolygonMode::Line => Some(wgpu::Features::POLYGON_MODE_LINE),
            bindery_core::PolygonMode::Point => Some(wgpu::Features::POLYGON_MODE_POINT),
        };
        if let Some(feature) = polygon_feature
            && !features.contains(feature)
        {
            return Err(CacheError::compilation(format!(
                "polygon mode {:?} requires {feature:?}",
                raster.polygon_mode()
            )));
        }
        Ok(())
    }

    fn create_pipeline(
        &self,
        key: &PipelineKey,
        layout: &wgpu::PipelineLayout,
    ) -> Result<wgpu::RenderPipeline> {
        if key.vertex_shader().is_null() {
            return Err(CacheError::compilation("no vertex shader bound"));
        }
        if key.subpass() != 0 {
            return Err(CacheError::compilation(format!(
                "subpass {} requested; wgpu has no subpasses",
                key.subpass()
            )));
        }
        let targets = self.render_targets.get(&key.render_pass()).ok_or_else(|| {
            CacheError::compilation(format!("unknown render target {:?}", key.render_pass()))
        })?;

        let raster = key.raster_state();
        self.validate_raster(raster)?;
        let cull_mode = convert::cull_mode(raster.cull_mode()).ok_or_else(|| {
            CacheError::compilation("front-and-back culling is not supported by wgpu")
        })?;

        let vertex = self.shader(key.vertex_shader(), "vertex")?;
        let fragment = if key.fragment_shader().is_null() {
            None
        } else {
            Some(self.shader(key.fragment_shader(), "fragment")?)
        };

        let attributes = vertex_attributes(key.vertex_layout())?;
        let buffers = vertex_buffers(key.vertex_layout(), &attributes);

        let blend = raster.blend().map(convert::blend_state);
        let write_mask = convert::color_writes(raster.color_writes());
        let color_targets: SmallVec<[Option<wgpu::ColorTargetState>; 4]> = targets
            .color
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask,
                })
            })
            .collect();

        let depth_stencil = targets.depth_stencil.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(raster.depth_write()),
            depth_compare: Some(convert::compare(raster.depth_compare())),
            stencil: stencil_state(raster),
            bias: wgpu::DepthBiasState::default(),
        });

        Ok(self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Bindery Pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(vertex.entry_point.as_str()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: fragment.map(|stage| wgpu::FragmentState {
                    module: &stage.module,
                    entry_point: Some(stage.entry_point.as_str()),
                    targets: &color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert::topology(key.topology()),
                    front_face: convert::front_face(raster.front_face()),
                    cull_mode,
                    polygon_mode: convert::polygon_mode(raster.polygon_mode()),
                    unclipped_depth: raster.depth_clamp(),
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: raster.sample_count(),
                    mask: !0,
                    alpha_to_coverage_enabled: raster.alpha_to_coverage(),
                },
                multiview_mask: None,
                cache: None,
            }))
    }

    // ─── Bind Groups ─────────────────────────────────────────────────────────

    fn buffer(&self, id: RawHandle) -> Result<&wgpu::Buffer> {
        self.buffers
            .get(&id)
            .ok_or_else(|| CacheError::stale("buffer", id))
    }

    fn view(&self, id: RawHandle) -> Result<&wgpu::TextureView> {
        if id.is_null() {
            return Ok(&self.placeholders.view);
        }
        self.views
            .get(&id)
            .ok_or_else(|| CacheError::stale("texture view", id))
    }

    fn sampler(&self, id: RawHandle) -> Result<&wgpu::Sampler> {
        if id.is_null() {
            return Ok(&self.placeholders.sampler);
        }
        self.samplers
            .get(&id)
            .ok_or_else(|| CacheError::stale("sampler", id))
    }

    fn create_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        updates: &DescriptorUpdateOp,
    ) -> Result<wgpu::BindGroup> {
        let mut uniforms = [const { None }; UNIFORM_BUFFER_BINDING_COUNT];
        let mut images = [(None, None); SAMPLER_BINDING_COUNT];

        for write in updates {
            match *write {
                DescriptorWrite::UniformBuffer {
                    slot,
                    buffer,
                    offset,
                    size,
                } => {
                    uniforms[slot as usize] = Some(wgpu::BufferBinding {
                        buffer: self.buffer(buffer)?,
                        offset,
                        size: if size == WHOLE_SIZE {
                            None
                        } else {
                            wgpu::BufferSize::new(size)
                        },
                    });
                }
                DescriptorWrite::SampledImage { slot, image } => {
                    images[slot as usize] =
                        (Some(self.view(image.image_view())?), Some(self.sampler(image.sampler())?));
                }
            }
        }

        let mut entries = Vec::with_capacity(UNIFORM_BUFFER_BINDING_COUNT + 2 * SAMPLER_BINDING_COUNT);
        for (slot, binding) in uniforms.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: uniform_binding(slot),
                resource: wgpu::BindingResource::Buffer(binding.unwrap_or(wgpu::BufferBinding {
                    buffer: &self.placeholders.buffer,
                    offset: 0,
                    size: None,
                })),
            });
        }
        for (slot, (view, sampler)) in images.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: texture_binding(slot),
                resource: wgpu::BindingResource::TextureView(
                    view.unwrap_or(&self.placeholders.view),
                ),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: sampler_binding(slot),
                resource: wgpu::BindingResource::Sampler(
                    sampler.unwrap_or(&self.placeholders.sampler),
                ),
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bindery Bind Group"),
            layout,
            entries: &entries,
        }))
    }
}

fn stencil_state(raster: &RasterState) -> wgpu::StencilState {
    if !raster.stencil_enabled() {
        return wgpu::StencilState::default();
    }
    wgpu::StencilState {
        front: convert::stencil_face(raster.stencil_front()),
        back: convert::stencil_face(raster.stencil_back()),
        read_mask: 0xff,
        write_mask: 0xff,
    }
}

/// Attributes grouped by buffer slot.
fn vertex_attributes(
    layout: &VertexLayout,
) -> Result<SmallVec<[SmallVec<[wgpu::VertexAttribute; 4]>; 4]>> {
    let slot_count = layout
        .buffers()
        .map(|(slot, _)| slot as usize + 1)
        .max()
        .unwrap_or(0);
    let mut grouped: SmallVec<[SmallVec<[wgpu::VertexAttribute; 4]>; 4]> =
        smallvec::smallvec![SmallVec::new(); slot_count];

    for attribute in layout.attributes() {
        let Some(format) = attribute.format() else {
            continue;
        };
        let slot = attribute.buffer_slot() as usize;
        let group = grouped.get_mut(slot).ok_or_else(|| {
            CacheError::compilation(format!(
                "attribute at location {} reads unconfigured buffer slot {slot}",
                attribute.location()
            ))
        })?;
        group.push(wgpu::VertexAttribute {
            format: convert::vertex_format(format),
            offset: u64::from(attribute.offset()),
            shader_location: attribute.location(),
        });
    }
    Ok(grouped)
}

/// One layout per slot up to the highest configured one; gaps get an empty
/// placeholder layout.
fn vertex_buffers<'a>(
    layout: &VertexLayout,
    attributes: &'a [SmallVec<[wgpu::VertexAttribute; 4]>],
) -> SmallVec<[wgpu::VertexBufferLayout<'a>; 4]> {
    let mut buffers: SmallVec<[wgpu::VertexBufferLayout<'a>; 4]> = attributes
        .iter()
        .map(|attrs| wgpu::VertexBufferLayout {
            array_stride: 0,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attrs,
        })
        .collect();
    for (slot, buffer) in layout.buffers() {
        if let (Some(target), Some(step)) = (buffers.get_mut(slot as usize), buffer.step_mode()) {
            target.array_stride = u64::from(buffer.stride());
            target.step_mode = convert::step_mode(step);
        }
    }
    buffers
}

impl NativeFactory for WgpuFactory {
    fn create_layouts(&mut self) -> Result<PipelineLayouts> {
        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bindery Bind Group Layout"),
                entries: &layout::bind_group_layout_entries(),
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Bindery Pipeline Layout"),
                bind_group_layouts: &[Some(&bind_group_layout)],
                immediate_size: 0,
            });

        let layouts = PipelineLayouts {
            descriptor_set_layout: self.allocate_id(),
            pipeline_layout: self.allocate_id(),
        };
        self.bind_group_layouts
            .insert(layouts.descriptor_set_layout, bind_group_layout);
        self.pipeline_layouts
            .insert(layouts.pipeline_layout, pipeline_layout);
        Ok(layouts)
    }

    fn destroy_layouts(&mut self, layouts: PipelineLayouts) {
        self.bind_group_layouts
            .remove(&layouts.descriptor_set_layout);
        self.pipeline_layouts.remove(&layouts.pipeline_layout);
    }

    fn compile_pipeline(
        &mut self,
        key: &PipelineKey,
        layouts: &PipelineLayouts,
    ) -> Result<RawHandle> {
        let layout = self
            .pipeline_layouts
            .get(&layouts.pipeline_layout)
            .ok_or_else(|| CacheError::stale("pipeline layout", layouts.pipeline_layout))?;
        let pipeline = self.create_pipeline(key, layout)?;

        let id = self.allocate_id();
        self.pipelines.insert(id, pipeline);
        Ok(id)
    }

    fn allocate_and_write_descriptor_set(
        &mut self,
        _key: &DescriptorKey,
        layouts: &PipelineLayouts,
        updates: &DescriptorUpdateOp,
    ) -> Result<RawHandle> {
        let layout = self
            .bind_group_layouts
            .get(&layouts.descriptor_set_layout)
            .ok_or_else(|| {
                CacheError::stale("bind group layout", layouts.descriptor_set_layout)
            })?;
        let bind_group = self.create_bind_group(layout, updates)?;

        let id = self.allocate_id();
        self.bind_groups.insert(id, bind_group);
        Ok(id)
    }

    fn destroy_pipeline(&mut self, handle: RawHandle) {
        if self.pipelines.remove(&handle).is_none() {
            log::warn!("WgpuFactory: destroy of unknown pipeline {handle:?}");
        }
    }

    fn destroy_descriptor_set(&mut self, handle: RawHandle) {
        if self.bind_groups.remove(&handle).is_none() {
            log::warn!("WgpuFactory: destroy of unknown bind group {handle:?}");
        }
    }
}
