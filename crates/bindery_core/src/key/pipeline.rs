//! Pipeline Key
//!
//! Everything needed to compile one pipeline object.

use bytemuck::{Pod, Zeroable};

use super::enums::PrimitiveTopology;
use super::impl_pod_key;
use super::raster::RasterState;
use super::vertex::VertexLayout;
use crate::handle::RawHandle;

/// Vertex + fragment.
pub const SHADER_STAGE_COUNT: usize = 2;

/// Pipeline-state key.
///
/// Shader modules and the render pass are weak references (raw handles): the
/// key does not keep them alive, it only identifies them.
///
/// Layout (248 bytes, no padding):
///
/// | Field | Bytes |
/// |-------|-------|
/// | `shaders` | 16 |
/// | `render_pass` | 8 |
/// | `raster` | 24 |
/// | `topology` | 4 |
/// | `subpass` | 4 |
/// | `vertex_layout` | 192 |
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PipelineKey {
    shaders: [RawHandle; SHADER_STAGE_COUNT],
    render_pass: RawHandle,
    raster: RasterState,
    topology: u32,
    subpass: u32,
    vertex_layout: VertexLayout,
}

const _: () = assert!(
    size_of::<PipelineKey>()
        == size_of::<[RawHandle; SHADER_STAGE_COUNT]>()
            + size_of::<RawHandle>()
            + size_of::<RasterState>()
            + size_of::<u32>()
            + size_of::<u32>()
            + size_of::<VertexLayout>(),
    "implicit padding is not allowed in PipelineKey"
);

impl_pod_key!(PipelineKey);

impl Default for PipelineKey {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl PipelineKey {
    /// The key a fresh binder starts from: no shaders, no render pass,
    /// [`RasterState::default()`], triangle lists, empty vertex layout.
    #[must_use]
    pub fn initial() -> Self {
        let mut key = Self::zeroed();
        key.set_raster_state(RasterState::default());
        key.set_topology(PrimitiveTopology::TriangleList);
        key
    }

    // ── Setters ──────────────────────────────────────────────────────────────

    #[inline]
    pub fn set_shaders(&mut self, vertex: RawHandle, fragment: RawHandle) {
        self.shaders = [vertex, fragment];
    }

    #[inline]
    pub fn set_raster_state(&mut self, raster: RasterState) {
        self.raster = raster;
    }

    #[inline]
    pub fn set_render_pass(&mut self, render_pass: RawHandle, subpass: u32) {
        self.render_pass = render_pass;
        self.subpass = subpass;
    }

    #[inline]
    pub fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology.to_raw();
    }

    #[inline]
    pub fn set_vertex_layout(&mut self, layout: VertexLayout) {
        self.vertex_layout = layout;
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn vertex_shader(&self) -> RawHandle {
        self.shaders[0]
    }

    #[inline]
    #[must_use]
    pub fn fragment_shader(&self) -> RawHandle {
        self.shaders[1]
    }

    #[inline]
    #[must_use]
    pub fn raster_state(&self) -> &RasterState {
        &self.raster
    }

    #[inline]
    #[must_use]
    pub fn render_pass(&self) -> RawHandle {
        self.render_pass
    }

    #[inline]
    #[must_use]
    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    #[must_use]
    pub fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::from_raw(self.topology).unwrap_or(PrimitiveTopology::TriangleList)
    }

    #[inline]
    #[must_use]
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CullMode, VertexFormat, VertexStepMode};

    #[test]
    fn pipeline_key_is_248_bytes() {
        assert_eq!(size_of::<PipelineKey>(), 248);
    }

    #[test]
    fn independent_setters_commute() {
        let layout = VertexLayout::new()
            .with_buffer(0, 12, VertexStepMode::Vertex)
            .with_attribute(0, 0, VertexFormat::Float32x3, 0);

        let mut a = PipelineKey::initial();
        a.set_shaders(RawHandle::from_raw(1), RawHandle::from_raw(2));
        a.set_vertex_layout(layout);
        a.set_render_pass(RawHandle::from_raw(9), 0);

        let mut b = PipelineKey::initial();
        b.set_render_pass(RawHandle::from_raw(9), 0);
        b.set_vertex_layout(layout);
        b.set_shaders(RawHandle::from_raw(1), RawHandle::from_raw(2));

        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn single_field_difference_is_distinct() {
        let a = PipelineKey::initial();
        let mut b = a;
        b.set_raster_state(RasterState::default().with_cull_mode(CullMode::Front));
        assert_ne!(a, b);

        let mut c = a;
        c.set_render_pass(RawHandle::NULL, 1);
        assert_ne!(a, c);
    }
}
