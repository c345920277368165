//! Dirty-Tracked Binder
//!
//! Per-recording-context state. `bind_*` calls only edit the in-progress keys
//! and raise a dirty flag; nothing touches the store until a draw is about to
//! be recorded and the caller asks to `resolve_*`.
//!
//! # Resolve
//!
//! - **Clean**: the current entry is re-used through its slot. No hashing, no
//!   map lookup; only the entry's timestamp is refreshed.
//! - **Dirty**: the key is looked up (or created) in the store. `changed`
//!   reports whether the resolved entry differs from the one previously bound,
//!   i.e. whether the caller must record a bind command.
//!
//! A binder keeps its current entries *bound* in the store, which exempts them
//! from eviction. [`Binder::release`] unbinds them immediately; a binder
//! dropped while still bound hands its bindings to the store's
//! [`UnbindQueue`], and they are released at the next `collect_garbage`.

use std::sync::Arc;

use bindery_core::{
    DescriptorKey, DescriptorUpdateOp, ImageDescriptor, PipelineKey, PrimitiveTopology,
    RasterState, RawHandle, Result, VertexLayout,
    key::{SAMPLER_BINDING_COUNT, UNIFORM_BUFFER_BINDING_COUNT},
};

use crate::access::CacheAccess;
use crate::entry::{Binding, DescriptorSlot, PipelineSlot, UnbindQueue};

/// Result of [`Binder::resolve_pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPipeline {
    pub handle: RawHandle,
    /// A bind command must be recorded.
    pub changed: bool,
}

/// Result of [`Binder::resolve_descriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    pub handle: RawHandle,
    /// Pipeline layout to bind the set against.
    pub layout: RawHandle,
    /// Writes applied to a set created by this resolve; empty otherwise.
    pub updates: DescriptorUpdateOp,
    pub changed: bool,
}

/// Tracks desired draw state and resolves it against a store.
///
/// Not `Clone`: a copy would share the original's bound entries without
/// holding a binding on them.
///
/// A binder records against one store for its whole life.
#[derive(Debug)]
pub struct Binder {
    pipeline_key: PipelineKey,
    descriptor_key: DescriptorKey,

    current_pipeline: Option<PipelineSlot>,
    current_descriptor: Option<DescriptorSlot>,

    pipeline_dirty: bool,
    descriptor_dirty: bool,

    // Dropped by `force_rebind`, unbound at the next resolve.
    released_pipeline: Option<PipelineSlot>,
    released_descriptor: Option<DescriptorSlot>,

    // Set by the first binding; receives what is still bound on drop.
    unbinds: Option<Arc<UnbindQueue>>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline_key: PipelineKey::initial(),
            descriptor_key: DescriptorKey::default(),
            current_pipeline: None,
            current_descriptor: None,
            pipeline_dirty: true,
            descriptor_dirty: true,
            released_pipeline: None,
            released_descriptor: None,
            unbinds: None,
        }
    }

    // ─── Pipeline State ──────────────────────────────────────────────────────

    pub fn bind_shaders(&mut self, vertex: RawHandle, fragment: RawHandle) {
        self.pipeline_key.set_shaders(vertex, fragment);
        self.pipeline_dirty = true;
    }

    pub fn bind_raster_state(&mut self, raster: RasterState) {
        self.pipeline_key.set_raster_state(raster);
        self.pipeline_dirty = true;
    }

    pub fn bind_render_pass(&mut self, render_pass: RawHandle, subpass: u32) {
        self.pipeline_key.set_render_pass(render_pass, subpass);
        self.pipeline_dirty = true;
    }

    pub fn bind_topology(&mut self, topology: PrimitiveTopology) {
        self.pipeline_key.set_topology(topology);
        self.pipeline_dirty = true;
    }

    pub fn bind_vertex_layout(&mut self, layout: VertexLayout) {
        self.pipeline_key.set_vertex_layout(layout);
        self.pipeline_dirty = true;
    }

    // ─── Descriptor State ────────────────────────────────────────────────────

    /// Binds `buffer[offset..offset + size]` to uniform `slot`. Out-of-range
    /// slots are rejected (and assert in debug builds).
    pub fn bind_uniform_buffer(&mut self, slot: usize, buffer: RawHandle, offset: u64, size: u64) {
        debug_assert!(
            slot < UNIFORM_BUFFER_BINDING_COUNT,
            "uniform buffer slot {slot} out of range"
        );
        if slot >= UNIFORM_BUFFER_BINDING_COUNT {
            log::error!("Binder: uniform buffer slot {slot} out of range, ignored");
            return;
        }
        self.descriptor_key.set_uniform_buffer(slot, buffer, offset, size);
        self.descriptor_dirty = true;
    }

    pub fn bind_sampler(&mut self, slot: usize, image: ImageDescriptor) {
        debug_assert!(slot < SAMPLER_BINDING_COUNT, "sampler slot {slot} out of range");
        if slot >= SAMPLER_BINDING_COUNT {
            log::error!("Binder: sampler slot {slot} out of range, ignored");
            return;
        }
        self.descriptor_key.set_sampler(slot, image);
        self.descriptor_dirty = true;
    }

    // ─── Resolve ─────────────────────────────────────────────────────────────

    /// Resolves the in-progress pipeline key to a native pipeline.
    ///
    /// On error nothing changes: the binder stays dirty and keeps its previous
    /// current pipeline.
    pub fn resolve_pipeline<S>(&mut self, store: &mut S) -> Result<ResolvedPipeline>
    where
        S: CacheAccess + ?Sized,
    {
        if let Some(released) = self.released_pipeline.take() {
            store.mark_pipeline_unbound(released);
        }

        if !self.pipeline_dirty
            && let Some(slot) = self.current_pipeline
        {
            if let Some(handle) = store.touch_pipeline(slot) {
                return Ok(ResolvedPipeline {
                    handle,
                    changed: false,
                });
            }
            log::debug!("Binder: current pipeline {slot:?} was retired, re-resolving");
            self.current_pipeline = None;
        }

        let (slot, handle) = store.pipeline(&self.pipeline_key)?;
        let changed = self.current_pipeline != Some(slot);
        if changed {
            if let Some(previous) = self.current_pipeline.replace(slot) {
                store.mark_pipeline_unbound(previous);
            }
            store.mark_pipeline_bound(slot);
            self.attach(&*store);
        }
        self.pipeline_dirty = false;
        Ok(ResolvedPipeline { handle, changed })
    }

    /// Resolves the in-progress descriptor key to a native descriptor set.
    pub fn resolve_descriptor<S>(&mut self, store: &mut S) -> Result<ResolvedDescriptor>
    where
        S: CacheAccess + ?Sized,
    {
        if let Some(released) = self.released_descriptor.take() {
            store.mark_descriptor_unbound(released);
        }

        if !self.descriptor_dirty
            && let Some(slot) = self.current_descriptor
        {
            if let Some(handle) = store.touch_descriptor(slot) {
                return Ok(ResolvedDescriptor {
                    handle,
                    layout: store.pipeline_layout(),
                    updates: DescriptorUpdateOp::default(),
                    changed: false,
                });
            }
            log::debug!("Binder: current descriptor set {slot:?} was retired, re-resolving");
            self.current_descriptor = None;
        }

        let lookup = store.descriptor(&self.descriptor_key)?;
        let changed = self.current_descriptor != Some(lookup.slot);
        if changed {
            if let Some(previous) = self.current_descriptor.replace(lookup.slot) {
                store.mark_descriptor_unbound(previous);
            }
            store.mark_descriptor_bound(lookup.slot);
            self.attach(&*store);
        }
        self.descriptor_dirty = false;
        Ok(ResolvedDescriptor {
            handle: lookup.handle,
            layout: store.pipeline_layout(),
            updates: lookup.updates,
            changed,
        })
    }

    /// Forgets the current entries so the next resolves report `changed`,
    /// e.g. after the command stream's bindings were reset. The in-progress
    /// keys are kept.
    pub fn force_rebind(&mut self) {
        if let Some(slot) = self.current_pipeline.take() {
            self.released_pipeline.get_or_insert(slot);
        }
        if let Some(slot) = self.current_descriptor.take() {
            self.released_descriptor.get_or_insert(slot);
        }
        self.pipeline_dirty = true;
        self.descriptor_dirty = true;
    }

    /// Unbinds every current entry from the store. The binder can keep
    /// recording afterwards; everything resolves as if fresh.
    ///
    /// Dropping a bound binder has the same effect, deferred to the store's
    /// next sweep.
    pub fn release<S>(&mut self, store: &S)
    where
        S: CacheAccess + ?Sized,
    {
        self.force_rebind();
        if let Some(slot) = self.released_pipeline.take() {
            store.mark_pipeline_unbound(slot);
        }
        if let Some(slot) = self.released_descriptor.take() {
            store.mark_descriptor_unbound(slot);
        }
    }

    // ─── Invalidation ────────────────────────────────────────────────────────

    /// Retires every cached descriptor set that references `buffer`.
    ///
    /// If this binder's current set was among them, the next
    /// [`resolve_descriptor`](Self::resolve_descriptor) creates a new one.
    /// Must be called before the buffer is freed.
    pub fn invalidate_uniform_buffer<S>(&mut self, store: &mut S, buffer: RawHandle) -> usize
    where
        S: CacheAccess + ?Sized,
    {
        let retired = store.invalidate_uniform_buffer(buffer);
        self.revalidate_descriptor(&*store);
        retired
    }

    /// Retires every cached descriptor set that samples `image_view`.
    ///
    /// Only image-view handles are matched: a sampler handle retires nothing.
    pub fn invalidate_image<S>(&mut self, store: &mut S, image_view: RawHandle) -> usize
    where
        S: CacheAccess + ?Sized,
    {
        let retired = store.invalidate_image(image_view);
        self.revalidate_descriptor(&*store);
        retired
    }

    /// Like [`invalidate_uniform_buffer`](Self::invalidate_uniform_buffer),
    /// and also clears the binder's own slots that bind `buffer`.
    pub fn unbind_uniform_buffer<S>(&mut self, store: &mut S, buffer: RawHandle) -> usize
    where
        S: CacheAccess + ?Sized,
    {
        if self.descriptor_key.clear_buffer(buffer) {
            self.descriptor_dirty = true;
        }
        self.invalidate_uniform_buffer(store, buffer)
    }

    /// Like [`invalidate_image`](Self::invalidate_image), and also clears the
    /// binder's own slots that sample `image_view`.
    pub fn unbind_image_view<S>(&mut self, store: &mut S, image_view: RawHandle) -> usize
    where
        S: CacheAccess + ?Sized,
    {
        if self.descriptor_key.clear_image(image_view) {
            self.descriptor_dirty = true;
        }
        self.invalidate_image(store, image_view)
    }

    fn attach<S>(&mut self, store: &S)
    where
        S: CacheAccess + ?Sized,
    {
        if self.unbinds.is_none() {
            self.unbinds = Some(store.unbind_queue());
        }
    }

    fn revalidate_descriptor<S>(&mut self, store: &S)
    where
        S: CacheAccess + ?Sized,
    {
        if let Some(slot) = self.current_descriptor
            && !store.descriptor_alive(slot)
        {
            self.current_descriptor = None;
            self.descriptor_dirty = true;
        }
        if let Some(slot) = self.released_descriptor
            && !store.descriptor_alive(slot)
        {
            self.released_descriptor = None;
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn pipeline_key(&self) -> &PipelineKey {
        &self.pipeline_key
    }

    #[inline]
    #[must_use]
    pub fn descriptor_key(&self) -> &DescriptorKey {
        &self.descriptor_key
    }

    #[inline]
    #[must_use]
    pub fn is_pipeline_dirty(&self) -> bool {
        self.pipeline_dirty
    }

    #[inline]
    #[must_use]
    pub fn is_descriptor_dirty(&self) -> bool {
        self.descriptor_dirty
    }

    #[inline]
    #[must_use]
    pub fn current_pipeline(&self) -> Option<PipelineSlot> {
        self.current_pipeline
    }

    #[inline]
    #[must_use]
    pub fn current_descriptor(&self) -> Option<DescriptorSlot> {
        self.current_descriptor
    }
}

impl Drop for Binder {
    fn drop(&mut self) {
        let Some(unbinds) = self.unbinds.take() else {
            return;
        };
        let bindings = [
            self.current_pipeline.take().map(Binding::Pipeline),
            self.released_pipeline.take().map(Binding::Pipeline),
            self.current_descriptor.take().map(Binding::Descriptor),
            self.released_descriptor.take().map(Binding::Descriptor),
        ];
        let mut deferred = 0;
        for binding in bindings.into_iter().flatten() {
            unbinds.push(binding);
            deferred += 1;
        }
        if deferred > 0 {
            log::debug!(
                "Binder: dropped while bound, deferring {deferred} unbinds to the next sweep"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use bindery_core::{CullMode, ImageLayout};

    use super::*;
    use crate::store::tests::store;

    fn h(bits: u64) -> RawHandle {
        RawHandle::from_raw(bits)
    }

    #[test]
    fn clean_resolve_skips_the_map() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.bind_shaders(h(100), h(101));

        let first = binder.resolve_pipeline(&mut store).unwrap();
        assert!(first.changed);
        let lookups = store.stats().pipeline_lookups;

        let second = binder.resolve_pipeline(&mut store).unwrap();
        assert_eq!(second.handle, first.handle);
        assert!(!second.changed);
        assert_eq!(store.stats().pipeline_lookups, lookups);
    }

    #[test]
    fn rebinding_identical_state_reports_unchanged() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.bind_shaders(h(100), h(101));
        binder.resolve_pipeline(&mut store).unwrap();

        binder.bind_shaders(h(100), h(101));
        assert!(binder.is_pipeline_dirty());
        let again = binder.resolve_pipeline(&mut store).unwrap();
        assert!(!again.changed);
        assert!(!binder.is_pipeline_dirty());
    }

    #[test]
    fn switching_state_moves_the_binding() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.resolve_pipeline(&mut store).unwrap();
        let first = binder.current_pipeline().unwrap();

        binder.bind_raster_state(RasterState::default().with_cull_mode(CullMode::None));
        assert!(binder.resolve_pipeline(&mut store).unwrap().changed);
        let second = binder.current_pipeline().unwrap();

        assert!(!store.pipeline_entry(first).unwrap().is_bound());
        assert!(store.pipeline_entry(second).unwrap().is_bound());
    }

    #[test]
    fn force_rebind_reports_change_for_same_entry() {
        let mut store = store();
        let mut binder = Binder::new();
        let first = binder.resolve_pipeline(&mut store).unwrap();

        binder.force_rebind();
        let again = binder.resolve_pipeline(&mut store).unwrap();
        assert_eq!(again.handle, first.handle);
        assert!(again.changed);

        let slot = binder.current_pipeline().unwrap();
        binder.release(&store);
        assert!(!store.pipeline_entry(slot).unwrap().is_bound());
    }

    #[test]
    fn failed_resolve_stays_dirty() {
        let mut store = store();
        let mut binder = Binder::new();
        store.factory_mut().fail_compilation = true;
        assert!(binder.resolve_pipeline(&mut store).is_err());
        assert!(binder.is_pipeline_dirty());
        assert_eq!(store.pipeline_count(), 0);

        store.factory_mut().fail_compilation = false;
        assert!(binder.resolve_pipeline(&mut store).unwrap().changed);
    }

    #[test]
    fn descriptor_updates_only_on_creation() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.bind_uniform_buffer(0, h(7), 0, 64);
        binder.bind_sampler(2, ImageDescriptor::new(h(8), h(9), ImageLayout::ShaderReadOnly));

        let created = binder.resolve_descriptor(&mut store).unwrap();
        assert_eq!(created.updates.len(), 2);
        assert_eq!(created.layout, store.layouts().pipeline_layout);

        binder.force_rebind();
        let hit = binder.resolve_descriptor(&mut store).unwrap();
        assert!(hit.changed);
        assert!(hit.updates.is_empty());
    }

    #[test]
    fn unbind_clears_slots_and_current_set() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.bind_uniform_buffer(1, h(7), 0, 64);
        binder.resolve_descriptor(&mut store).unwrap();

        assert_eq!(binder.unbind_uniform_buffer(&mut store, h(7)), 1);
        assert!(binder.current_descriptor().is_none());
        assert!(binder.is_descriptor_dirty());
        assert_eq!(*binder.descriptor_key(), DescriptorKey::default());

        let fresh = binder.resolve_descriptor(&mut store).unwrap();
        assert!(fresh.changed);
        assert!(fresh.updates.is_empty());
    }

    #[test]
    fn dropping_a_bound_binder_unpins_at_the_next_sweep() {
        let mut store = store();
        let slot = {
            let mut binder = Binder::new();
            binder.bind_uniform_buffer(0, h(7), 0, 64);
            binder.resolve_pipeline(&mut store).unwrap();
            binder.resolve_descriptor(&mut store).unwrap();
            binder.current_pipeline().unwrap()
        };
        assert!(store.pipeline_entry(slot).unwrap().is_bound());
        assert_eq!(store.unbind_queue().len(), 2);

        assert_eq!(store.collect_garbage(1000), 2);
        assert!(store.pipeline_entry(slot).is_none());
    }

    #[test]
    fn released_binder_leaves_nothing_to_defer() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.resolve_pipeline(&mut store).unwrap();
        binder.force_rebind();
        binder.resolve_pipeline(&mut store).unwrap();
        binder.release(&store);
        drop(binder);
        assert!(store.unbind_queue().is_empty());
    }

    #[test]
    fn force_rebind_then_drop_defers_the_released_slot_once() {
        let mut store = store();
        let mut binder = Binder::new();
        binder.resolve_pipeline(&mut store).unwrap();
        let slot = binder.current_pipeline().unwrap();
        binder.force_rebind();
        drop(binder);

        assert_eq!(store.unbind_queue().len(), 1);
        store.collect_garbage(1);
        assert!(!store.pipeline_entry(slot).unwrap().is_bound());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn out_of_range_slot_is_ignored() {
        let mut binder = Binder::new();
        binder.resolve_descriptor(&mut store()).unwrap();
        binder.bind_uniform_buffer(UNIFORM_BUFFER_BINDING_COUNT, h(1), 0, 16);
        assert!(!binder.is_descriptor_dirty());
    }
}
