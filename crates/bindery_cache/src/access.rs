//! Store Access
//!
//! [`CacheAccess`] is what a [`Binder`](crate::Binder) needs from a store. It is
//! implemented by the single-context [`CacheStore`](crate::CacheStore) and by
//! the thread-shared [`SharedCacheStore`](crate::SharedCacheStore), so the
//! same binder code records against either.

use std::sync::Arc;

use bindery_core::{DescriptorKey, DescriptorUpdateOp, PipelineKey, RawHandle, Result};

use crate::entry::{DescriptorSlot, PipelineSlot, UnbindQueue};

/// A resolved descriptor-set lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorLookup {
    pub slot: DescriptorSlot,
    pub handle: RawHandle,
    /// Writes applied to a set created by this lookup; empty on a hit.
    pub updates: DescriptorUpdateOp,
}

pub trait CacheAccess {
    /// Hit-or-create for `key`. Counts one map lookup.
    fn pipeline(&mut self, key: &PipelineKey) -> Result<(PipelineSlot, RawHandle)>;

    /// Refreshes the entry behind `slot` and returns its handle, or `None` if
    /// the entry is gone. Performs no map lookup.
    fn touch_pipeline(&self, slot: PipelineSlot) -> Option<RawHandle>;

    fn mark_pipeline_bound(&self, slot: PipelineSlot);

    fn mark_pipeline_unbound(&self, slot: PipelineSlot);

    /// Hit-or-create for `key`. Counts one map lookup.
    fn descriptor(&mut self, key: &DescriptorKey) -> Result<DescriptorLookup>;

    fn touch_descriptor(&self, slot: DescriptorSlot) -> Option<RawHandle>;

    /// Whether `slot` still names a live entry. Neither refreshes nor counts.
    fn descriptor_alive(&self, slot: DescriptorSlot) -> bool;

    fn mark_descriptor_bound(&self, slot: DescriptorSlot);

    fn mark_descriptor_unbound(&self, slot: DescriptorSlot);

    /// Pipeline layout shared by every cached object.
    fn pipeline_layout(&self) -> RawHandle;

    fn invalidate_uniform_buffer(&mut self, buffer: RawHandle) -> usize;

    /// Retires every cached descriptor set sampling `image_view`. Sampler
    /// handles are not matched.
    fn invalidate_image(&mut self, image_view: RawHandle) -> usize;

    /// Where a binder dropped without `release` leaves its bindings.
    fn unbind_queue(&self) -> Arc<UnbindQueue>;
}
