//! Bindery Core
//!
//! Foundational types shared by every Bindery crate:
//!
//! - [`RawHandle`]: opaque native object handle, stored as raw bits
//! - [`key`]: padding-free, byte-comparable state keys
//!   ([`PipelineKey`], [`DescriptorKey`]) and the value types they are built from
//! - [`CacheError`] / [`Result`]: error type of the cache
//! - [`CacheSettings`]: tunables (eviction threshold, graveyard latency, pool size)

pub mod error;
pub mod handle;
pub mod key;
pub mod settings;

pub use error::{CacheError, Result};
pub use handle::RawHandle;
pub use key::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, ColorWrites, CompareFunction,
    CullMode, DescriptorKey, DescriptorUpdateOp, DescriptorWrite, FrontFace, ImageDescriptor,
    ImageLayout, PipelineKey, PolygonMode, PrimitiveTopology, RasterState, StencilFaceState,
    StencilOperation, VertexAttribute, VertexBufferSlot, VertexFormat, VertexLayout,
    VertexStepMode,
};
pub use settings::CacheSettings;
