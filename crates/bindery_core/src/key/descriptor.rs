//! Descriptor Key
//!
//! Everything written into one descriptor set: per-slot uniform buffer ranges
//! and per-slot sampled images. A descriptor set is written exactly once, at
//! creation, from the [`DescriptorUpdateOp`] derived from its key.

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use super::enums::ImageLayout;
use super::impl_pod_key;
use crate::handle::RawHandle;

/// Number of uniform-buffer binding slots.
pub const UNIFORM_BUFFER_BINDING_COUNT: usize = 8;

/// Number of sampled-image binding slots.
pub const SAMPLER_BINDING_COUNT: usize = 16;

/// Binds the buffer from `offset` to its end.
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Sampler + image view pair bound to one sampler slot.
///
/// 24 bytes: two handles, the layout and a declared, always-zero hole that
/// keeps the record padding-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct ImageDescriptor {
    sampler: RawHandle,
    image_view: RawHandle,
    layout: u32,
    _reserved: u32,
}

const _: () = assert!(
    size_of::<ImageDescriptor>() == 2 * size_of::<RawHandle>() + 2 * size_of::<u32>(),
    "implicit padding is not allowed in ImageDescriptor"
);

impl ImageDescriptor {
    /// The unbound slot.
    pub const NULL: Self = Self {
        sampler: RawHandle::NULL,
        image_view: RawHandle::NULL,
        layout: 0,
        _reserved: 0,
    };

    #[must_use]
    pub const fn new(sampler: RawHandle, image_view: RawHandle, layout: ImageLayout) -> Self {
        Self {
            sampler,
            image_view,
            layout: layout.to_raw(),
            _reserved: 0,
        }
    }

    #[must_use]
    pub fn sampler(&self) -> RawHandle {
        self.sampler
    }

    #[must_use]
    pub fn image_view(&self) -> RawHandle {
        self.image_view
    }

    #[must_use]
    pub fn layout(&self) -> ImageLayout {
        ImageLayout::from_raw(self.layout).unwrap_or(ImageLayout::Undefined)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.sampler.is_null() && self.image_view.is_null()
    }
}

/// Resource-binding key.
///
/// Layout (576 bytes, no padding): 8 buffer handles, 8 offsets, 8 sizes,
/// 16 image descriptors.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct DescriptorKey {
    uniform_buffers: [RawHandle; UNIFORM_BUFFER_BINDING_COUNT],
    uniform_buffer_offsets: [u64; UNIFORM_BUFFER_BINDING_COUNT],
    uniform_buffer_sizes: [u64; UNIFORM_BUFFER_BINDING_COUNT],
    samplers: [ImageDescriptor; SAMPLER_BINDING_COUNT],
}

const _: () = assert!(
    size_of::<DescriptorKey>()
        == size_of::<[RawHandle; UNIFORM_BUFFER_BINDING_COUNT]>()
            + size_of::<[u64; UNIFORM_BUFFER_BINDING_COUNT]>()
            + size_of::<[u64; UNIFORM_BUFFER_BINDING_COUNT]>()
            + size_of::<[ImageDescriptor; SAMPLER_BINDING_COUNT]>(),
    "implicit padding is not allowed in DescriptorKey"
);

impl_pod_key!(DescriptorKey);

impl Default for DescriptorKey {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl DescriptorKey {
    /// Binds `buffer[offset..offset + size]` to uniform `slot`.
    ///
    /// Binding [`RawHandle::NULL`] clears the slot (offset and size are zeroed
    /// too, so a cleared slot is indistinguishable from a never-bound one).
    ///
    /// # Panics
    /// If `slot >= UNIFORM_BUFFER_BINDING_COUNT`.
    pub fn set_uniform_buffer(&mut self, slot: usize, buffer: RawHandle, offset: u64, size: u64) {
        let (offset, size) = if buffer.is_null() { (0, 0) } else { (offset, size) };
        self.uniform_buffers[slot] = buffer;
        self.uniform_buffer_offsets[slot] = offset;
        self.uniform_buffer_sizes[slot] = size;
    }

    /// # Panics
    /// If `slot >= SAMPLER_BINDING_COUNT`.
    pub fn set_sampler(&mut self, slot: usize, image: ImageDescriptor) {
        self.samplers[slot] = image;
    }

    /// `(buffer, offset, size)` bound to uniform `slot`.
    #[must_use]
    pub fn uniform_buffer(&self, slot: usize) -> (RawHandle, u64, u64) {
        (
            self.uniform_buffers[slot],
            self.uniform_buffer_offsets[slot],
            self.uniform_buffer_sizes[slot],
        )
    }

    #[must_use]
    pub fn sampler(&self, slot: usize) -> ImageDescriptor {
        self.samplers[slot]
    }

    /// `true` if any uniform slot binds `buffer`.
    #[must_use]
    pub fn references_buffer(&self, buffer: RawHandle) -> bool {
        !buffer.is_null() && self.uniform_buffers.contains(&buffer)
    }

    /// `true` if any sampler slot binds `image_view`. Matches the image view
    /// only; a slot's sampler handle never matches.
    #[must_use]
    pub fn references_image(&self, image_view: RawHandle) -> bool {
        !image_view.is_null() && self.samplers.iter().any(|s| s.image_view == image_view)
    }

    /// Clears every uniform slot bound to `buffer`; returns whether any was.
    pub fn clear_buffer(&mut self, buffer: RawHandle) -> bool {
        let mut cleared = false;
        for slot in 0..UNIFORM_BUFFER_BINDING_COUNT {
            if !buffer.is_null() && self.uniform_buffers[slot] == buffer {
                self.set_uniform_buffer(slot, RawHandle::NULL, 0, 0);
                cleared = true;
            }
        }
        cleared
    }

    /// Clears every sampler slot bound to `image_view` (not to a sampler
    /// handle); returns whether any was.
    pub fn clear_image(&mut self, image_view: RawHandle) -> bool {
        let mut cleared = false;
        for sampler in &mut self.samplers {
            if !image_view.is_null() && sampler.image_view == image_view {
                *sampler = ImageDescriptor::NULL;
                cleared = true;
            }
        }
        cleared
    }

    /// The writes that populate a freshly allocated set from this key, one per
    /// bound slot. Unbound slots produce no write.
    #[must_use]
    pub fn update_op(&self) -> DescriptorUpdateOp {
        let mut writes = SmallVec::new();
        for slot in 0..UNIFORM_BUFFER_BINDING_COUNT {
            let (buffer, offset, size) = self.uniform_buffer(slot);
            if !buffer.is_null() {
                writes.push(DescriptorWrite::UniformBuffer {
                    slot: slot as u32,
                    buffer,
                    offset,
                    size,
                });
            }
        }
        for (slot, image) in self.samplers.iter().enumerate() {
            if !image.is_null() {
                writes.push(DescriptorWrite::SampledImage {
                    slot: slot as u32,
                    image: *image,
                });
            }
        }
        DescriptorUpdateOp { writes }
    }
}

// ─── Update Ops ───────────────────────────────────────────────────────────────

/// A single descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorWrite {
    UniformBuffer {
        slot: u32,
        buffer: RawHandle,
        offset: u64,
        size: u64,
    },
    SampledImage {
        slot: u32,
        image: ImageDescriptor,
    },
}

/// The one-time writes of a new descriptor set.
///
/// Empty when a resolve hit an existing set: its contents already match the
/// key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorUpdateOp {
    writes: SmallVec<[DescriptorWrite; 8]>,
}

impl DescriptorUpdateOp {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    #[inline]
    #[must_use]
    pub fn writes(&self) -> &[DescriptorWrite] {
        &self.writes
    }
}

impl<'a> IntoIterator for &'a DescriptorUpdateOp {
    type Item = &'a DescriptorWrite;
    type IntoIter = std::slice::Iter<'a, DescriptorWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(bits: u64) -> RawHandle {
        RawHandle::from_raw(bits)
    }

    #[test]
    fn descriptor_key_is_576_bytes() {
        assert_eq!(size_of::<DescriptorKey>(), 576);
    }

    #[test]
    fn cleared_slot_equals_never_bound() {
        let mut key = DescriptorKey::default();
        key.set_uniform_buffer(2, handle(7), 256, 64);
        assert!(key.clear_buffer(handle(7)));
        assert_eq!(key, DescriptorKey::default());
        assert!(!key.clear_buffer(handle(7)));
    }

    #[test]
    fn references_match_any_slot() {
        let mut key = DescriptorKey::default();
        key.set_uniform_buffer(5, handle(11), 0, WHOLE_SIZE);
        key.set_sampler(
            3,
            ImageDescriptor::new(handle(20), handle(21), ImageLayout::ShaderReadOnly),
        );

        assert!(key.references_buffer(handle(11)));
        assert!(!key.references_buffer(handle(12)));
        assert!(key.references_image(handle(21)));
        // Samplers are not image views.
        assert!(!key.references_image(handle(20)));
        // Null never matches, even though unbound slots hold it.
        assert!(!key.references_buffer(RawHandle::NULL));
    }

    #[test]
    fn update_op_covers_only_bound_slots() {
        let mut key = DescriptorKey::default();
        key.set_uniform_buffer(0, handle(1), 0, 128);
        key.set_uniform_buffer(4, handle(2), 512, WHOLE_SIZE);
        key.set_sampler(
            0,
            ImageDescriptor::new(handle(3), handle(4), ImageLayout::ShaderReadOnly),
        );

        let op = key.update_op();
        assert_eq!(op.len(), 3);
        assert_eq!(
            op.writes()[1],
            DescriptorWrite::UniformBuffer {
                slot: 4,
                buffer: handle(2),
                offset: 512,
                size: WHOLE_SIZE,
            }
        );
        assert!(DescriptorKey::default().update_op().is_empty());
    }
}
