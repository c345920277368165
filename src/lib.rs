//! # Bindery
//!
//! A dirty-tracked GPU pipeline and descriptor-set state cache.
//!
//! Renderers describe draw state with cheap `bind_*` calls. Bindery turns that
//! state into the minimum number of native objects: identical state vectors
//! share one compiled pipeline or one written descriptor set, nothing is
//! resolved until a draw needs it, idle entries are evicted after a few
//! frames, and entries referencing a resource about to be freed are retired
//! first.
//!
//! ## Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `bindery_core` | handles, state keys ([`key`]), errors, settings |
//! | `bindery_cache` | binder, stores, graveyard, native factory trait |
//! | `bindery_wgpu` (feature `wgpu`) | `NativeFactory` over `wgpu` |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bindery::prelude::*;
//!
//! let mut store = CacheStore::new(factory, CacheSettings::default())?;
//! let mut binder = Binder::new();
//!
//! binder.bind_shaders(vs, fs);
//! binder.bind_render_pass(pass, 0);
//! binder.bind_uniform_buffer(0, ubo, 0, WHOLE_SIZE);
//!
//! let pipeline = binder.resolve_pipeline(&mut store)?;
//! let set = binder.resolve_descriptor(&mut store)?;
//!
//! // Once per frame, after recording:
//! store.collect_garbage(frame);
//! ```

pub use bindery_core::key;
#[cfg(feature = "wgpu")]
pub use bindery_wgpu as wgpu;

pub use bindery_cache::{
    Binder, CacheAccess, CacheEntry, CacheStatsSnapshot, CacheStore, DescriptorLookup,
    DescriptorSlot, Graveyard, NativeFactory, PipelineLayouts, PipelineSlot, ResolvedDescriptor,
    ResolvedPipeline, Retired, SharedCacheStore, UnbindQueue,
};
pub use bindery_core::{
    CacheError, CacheSettings, DescriptorKey, ImageDescriptor, PipelineKey, RasterState,
    RawHandle, Result, VertexLayout,
};

/// Commonly used types.
pub mod prelude {
    pub use bindery_cache::{
        Binder, CacheAccess, CacheStore, NativeFactory, PipelineLayouts, SharedCacheStore,
    };
    pub use bindery_core::key::WHOLE_SIZE;
    pub use bindery_core::{
        BlendState, CacheError, CacheSettings, ColorWrites, CompareFunction, CullMode,
        DescriptorKey, FrontFace, ImageDescriptor, ImageLayout, PipelineKey, PrimitiveTopology,
        RasterState, RawHandle, VertexFormat, VertexLayout, VertexStepMode,
    };
}
