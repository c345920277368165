//! Vertex Input Layout
//!
//! A fixed-size vertex assembler configuration: which attribute location reads
//! which buffer slot, at what offset and format, and how each slot advances.
//! It never refers to actual buffers, only to slot numbers, so it belongs to
//! the pipeline key rather than to the descriptor key.
//!
//! Unused entries are all-zero (format `0`, step mode `0`).

use bytemuck::{Pod, Zeroable};

use super::enums::{VertexFormat, VertexStepMode};

/// Number of attribute locations (and buffer slots) a layout can describe.
pub const MAX_VERTEX_ATTRIBUTES: usize = 8;

/// One vertex attribute, indexed in the layout by its shader location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct VertexAttribute {
    buffer_slot: u32,
    format: u32,
    offset: u32,
    location: u32,
}

impl VertexAttribute {
    #[must_use]
    pub fn buffer_slot(&self) -> u32 {
        self.buffer_slot
    }

    #[must_use]
    pub fn format(&self) -> Option<VertexFormat> {
        VertexFormat::from_raw(self.format)
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn location(&self) -> u32 {
        self.location
    }
}

/// Stride and step mode of one vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct VertexBufferSlot {
    stride: u32,
    step_mode: u32,
}

impl VertexBufferSlot {
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[must_use]
    pub fn step_mode(&self) -> Option<VertexStepMode> {
        VertexStepMode::from_raw(self.step_mode)
    }
}

/// Attribute → buffer-slot bindings for one draw.
///
/// ```
/// use bindery_core::{VertexFormat, VertexLayout, VertexStepMode};
///
/// let layout = VertexLayout::new()
///     .with_buffer(0, 32, VertexStepMode::Vertex)
///     .with_attribute(0, 0, VertexFormat::Float32x3, 0)
///     .with_attribute(1, 0, VertexFormat::Float32x3, 12)
///     .with_attribute(2, 0, VertexFormat::Float32x2, 24);
/// assert_eq!(layout.attributes().count(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct VertexLayout {
    attributes: [VertexAttribute; MAX_VERTEX_ATTRIBUTES],
    buffers: [VertexBufferSlot; MAX_VERTEX_ATTRIBUTES],
}

const _: () = assert!(
    size_of::<VertexLayout>()
        == size_of::<[VertexAttribute; MAX_VERTEX_ATTRIBUTES]>()
            + size_of::<[VertexBufferSlot; MAX_VERTEX_ATTRIBUTES]>(),
    "implicit padding is not allowed in VertexLayout"
);

impl Default for VertexLayout {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl VertexLayout {
    /// An empty layout (no attributes, no buffers).
    #[must_use]
    pub fn new() -> Self {
        Self::zeroed()
    }

    /// Configures buffer `slot`.
    ///
    /// # Panics
    /// If `slot >= MAX_VERTEX_ATTRIBUTES`.
    #[must_use]
    pub fn with_buffer(mut self, slot: usize, stride: u32, step_mode: VertexStepMode) -> Self {
        self.buffers[slot] = VertexBufferSlot {
            stride,
            step_mode: step_mode.to_raw(),
        };
        self
    }

    /// Declares the attribute at shader `location`, read from `buffer_slot`.
    ///
    /// # Panics
    /// If `location >= MAX_VERTEX_ATTRIBUTES`.
    #[must_use]
    pub fn with_attribute(
        mut self,
        location: usize,
        buffer_slot: u32,
        format: VertexFormat,
        offset: u32,
    ) -> Self {
        self.attributes[location] = VertexAttribute {
            buffer_slot,
            format: format.to_raw(),
            offset,
            location: location as u32,
        };
        self
    }

    /// Used attributes, in location order.
    pub fn attributes(&self) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.iter().filter(|a| a.format != 0)
    }

    /// Used buffer slots with their slot index, in slot order.
    pub fn buffers(&self) -> impl Iterator<Item = (u32, &VertexBufferSlot)> {
        self.buffers
            .iter()
            .enumerate()
            .filter(|(_, b)| b.step_mode != 0)
            .map(|(slot, b)| (slot as u32, b))
    }

    /// Attributes that read from `slot`.
    pub fn attributes_for_slot(&self, slot: u32) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes().filter(move |a| a.buffer_slot == slot)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_entries_stay_zero() {
        let layout = VertexLayout::new()
            .with_buffer(1, 16, VertexStepMode::Instance)
            .with_attribute(3, 1, VertexFormat::Float32x4, 0);

        assert_eq!(layout.attributes().count(), 1);
        let (slot, buffer) = layout.buffers().next().unwrap();
        assert_eq!(slot, 1);
        assert_eq!(buffer.step_mode(), Some(VertexStepMode::Instance));

        let bytes = bytemuck::bytes_of(&layout);
        let nonzero = bytes.iter().filter(|b| **b != 0).count();
        // stride(16) + step(2) + slot(1) + format + location(3)
        assert_eq!(nonzero, 5);
    }

    #[test]
    fn attributes_filter_by_slot() {
        let layout = VertexLayout::new()
            .with_buffer(0, 12, VertexStepMode::Vertex)
            .with_buffer(1, 8, VertexStepMode::Vertex)
            .with_attribute(0, 0, VertexFormat::Float32x3, 0)
            .with_attribute(1, 1, VertexFormat::Float32x2, 0);

        let on_slot_one: Vec<_> = layout.attributes_for_slot(1).collect();
        assert_eq!(on_slot_one.len(), 1);
        assert_eq!(on_slot_one[0].location(), 1);
    }
}
