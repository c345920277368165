//! Native Factory
//!
//! The backend boundary. The cache never creates or destroys a native object
//! itself; it calls through a [`NativeFactory`]. Everything on the other side
//! of this trait (device object compilation, descriptor writes, pool
//! management) is backend-specific.

use bindery_core::{DescriptorKey, DescriptorUpdateOp, PipelineKey, RawHandle, Result};

/// Layout objects shared by every pipeline and descriptor set of one store.
///
/// Created once when the store is built and destroyed when it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLayouts {
    /// Layout every descriptor set is allocated against.
    pub descriptor_set_layout: RawHandle,
    /// Pipeline layout every pipeline is compiled against; handed back to
    /// callers by `resolve_descriptor` for the native bind call.
    pub pipeline_layout: RawHandle,
}

/// Creates and destroys native pipeline and descriptor-set objects.
///
/// All calls are synchronous. A returned handle must be usable (safe to submit)
/// immediately, even if the device finishes compilation asynchronously.
pub trait NativeFactory {
    /// Creates the descriptor-set layout and pipeline layout.
    fn create_layouts(&mut self) -> Result<PipelineLayouts>;

    /// Destroys what [`create_layouts`](Self::create_layouts) returned.
    fn destroy_layouts(&mut self, layouts: PipelineLayouts);

    /// Compiles a pipeline object for `key`.
    ///
    /// Expensive; the cache calls it once per distinct key for as long as the
    /// key stays resident. Returns `CacheError::CompilationFailure` when the
    /// backend rejects the key.
    fn compile_pipeline(&mut self, key: &PipelineKey, layouts: &PipelineLayouts)
    -> Result<RawHandle>;

    /// Allocates a descriptor set and applies `updates` (the writes derived
    /// from `key`) to it. Returns `CacheError::AllocationExhausted` when the
    /// pool is full.
    fn allocate_and_write_descriptor_set(
        &mut self,
        key: &DescriptorKey,
        layouts: &PipelineLayouts,
        updates: &DescriptorUpdateOp,
    ) -> Result<RawHandle>;

    fn destroy_pipeline(&mut self, handle: RawHandle);

    fn destroy_descriptor_set(&mut self, handle: RawHandle);
}

impl<F: NativeFactory + ?Sized> NativeFactory for Box<F> {
    fn create_layouts(&mut self) -> Result<PipelineLayouts> {
        (**self).create_layouts()
    }

    fn destroy_layouts(&mut self, layouts: PipelineLayouts) {
        (**self).destroy_layouts(layouts);
    }

    fn compile_pipeline(
        &mut self,
        key: &PipelineKey,
        layouts: &PipelineLayouts,
    ) -> Result<RawHandle> {
        (**self).compile_pipeline(key, layouts)
    }

    fn allocate_and_write_descriptor_set(
        &mut self,
        key: &DescriptorKey,
        layouts: &PipelineLayouts,
        updates: &DescriptorUpdateOp,
    ) -> Result<RawHandle> {
        (**self).allocate_and_write_descriptor_set(key, layouts, updates)
    }

    fn destroy_pipeline(&mut self, handle: RawHandle) {
        (**self).destroy_pipeline(handle);
    }

    fn destroy_descriptor_set(&mut self, handle: RawHandle) {
        (**self).destroy_descriptor_set(handle);
    }
}
