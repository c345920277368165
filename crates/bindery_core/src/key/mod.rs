//! State Keys
//!
//! Two independent key families describe everything a draw needs:
//!
//! - [`PipelineKey`]: all state baked into one compiled pipeline object
//! - [`DescriptorKey`]: all resources written into one descriptor set
//!
//! Both are `#[repr(C)]` records deriving [`bytemuck::Pod`], which rejects any
//! compiler-inserted padding at build time. Each also carries a `const`
//! assertion that its size equals the sum of its members. Equality compares the
//! raw bytes and hashing runs xxh3 over the same bytes, so two keys share a
//! cache entry exactly when they are bitwise identical.
//!
//! Keys always start from [`bytemuck::Zeroable::zeroed`]; unset fields are
//! zero, never left unspecified.

mod descriptor;
mod enums;
mod pipeline;
mod raster;
mod vertex;

pub use descriptor::{
    DescriptorKey, DescriptorUpdateOp, DescriptorWrite, ImageDescriptor, SAMPLER_BINDING_COUNT,
    UNIFORM_BUFFER_BINDING_COUNT, WHOLE_SIZE,
};
pub use enums::{
    BlendFactor, BlendOperation, ColorWrites, CompareFunction, CullMode, FrontFace, ImageLayout,
    PolygonMode, PrimitiveTopology, StencilOperation, VertexFormat, VertexStepMode,
};
pub use pipeline::{PipelineKey, SHADER_STAGE_COUNT};
pub use raster::{BlendComponent, BlendState, RasterState, StencilFaceState};
pub use vertex::{MAX_VERTEX_ATTRIBUTES, VertexAttribute, VertexBufferSlot, VertexLayout};

/// Hashes raw key bytes with xxh3-64.
#[inline]
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

/// Implements byte-wise `PartialEq`/`Eq`/`Hash` for a `Pod` key.
macro_rules! impl_pod_key {
    ($key:ty) => {
        impl $key {
            /// The key's raw bytes.
            #[inline]
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                bytemuck::bytes_of(self)
            }

            /// xxh3-64 over the key's raw bytes.
            #[inline]
            #[must_use]
            pub fn content_hash(&self) -> u64 {
                $crate::key::hash_bytes(self.as_bytes())
            }
        }

        impl PartialEq for $key {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.as_bytes() == other.as_bytes()
            }
        }

        impl Eq for $key {}

        impl std::hash::Hash for $key {
            #[inline]
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                state.write_u64(self.content_hash());
            }
        }
    };
}

pub(crate) use impl_pod_key;
