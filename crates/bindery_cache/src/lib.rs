//! Bindery Cache
//!
//! Turns cheap, frequent bind calls into the minimum set of native pipeline
//! and descriptor-set objects.
//!
//! - [`Binder`]: per-context dirty tracking; resolves only when a draw needs it
//! - [`CacheStore`]: content-addressed pipeline / descriptor-set tables with
//!   frame-based eviction and a [`Graveyard`] for deferred destruction
//! - [`SharedCacheStore`]: a `CacheStore` shared across recording threads
//! - [`NativeFactory`]: the backend boundary that creates and destroys objects
//!
//! # Frame Loop
//!
//! ```rust,ignore
//! let mut binder = Binder::new();
//! for draw in draws {
//!     binder.bind_shaders(draw.vs, draw.fs);
//!     binder.bind_uniform_buffer(0, draw.ubo, 0, WHOLE_SIZE);
//!
//!     let pipeline = binder.resolve_pipeline(&mut store)?;
//!     if pipeline.changed {
//!         cmd.bind_pipeline(pipeline.handle);
//!     }
//!     let set = binder.resolve_descriptor(&mut store)?;
//!     if set.changed {
//!         cmd.bind_descriptor_set(set.layout, set.handle);
//!     }
//!     cmd.draw(draw.count);
//! }
//! store.collect_garbage(frame);
//! ```

mod access;
mod binder;
mod entry;
mod factory;
mod graveyard;
mod shared;
mod stats;
mod store;

pub use access::{CacheAccess, DescriptorLookup};
pub use binder::{Binder, ResolvedDescriptor, ResolvedPipeline};
pub use entry::{
    CacheEntry, DescriptorSlot, DescriptorVal, PipelineSlot, PipelineVal, UnbindQueue,
};
pub use factory::{NativeFactory, PipelineLayouts};
pub use graveyard::{Graveyard, Retired};
pub use shared::SharedCacheStore;
pub use stats::CacheStatsSnapshot;
pub use store::CacheStore;
