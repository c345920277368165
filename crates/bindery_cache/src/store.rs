//! Cache Store
//!
//! Owns every cached pipeline and descriptor set of one device context, the
//! graveyard of retired objects, and the layouts they are all built against.
//!
//! # Design
//!
//! - **Content addressed**: entries are keyed by the full [`PipelineKey`] /
//!   [`DescriptorKey`]; identical state from any binder shares one native object.
//! - **Read-only hits**: a hit refreshes the entry's timestamp through an atomic
//!   and never mutates map state, so hits only need `&self`.
//! - **Frame-based eviction**: [`collect_garbage`](CacheStore::collect_garbage)
//!   retires entries unused for more than `eviction_threshold` frames. Entries a
//!   binder currently holds bound are skipped.
//! - **Deferred destruction**: retired objects wait in the [`Graveyard`] until
//!   their frame has left the GPU.
//!
//! # Frames
//!
//! Frame numbers are consecutive. Between `collect_garbage(n)` and
//! `collect_garbage(n + 1)` the store is recording frame `n + 1`: objects
//! retired by invalidation or [`clear`](CacheStore::clear) during that window
//! may still be referenced by it, so they are buried at `n + 1` and survive
//! until `collect_garbage(n + 1 + graveyard_latency)`.

use std::sync::Arc;

use bindery_core::{CacheError, CacheSettings, DescriptorKey, PipelineKey, RawHandle, Result};
use slotmap::Key;

use crate::access::{CacheAccess, DescriptorLookup};
use crate::entry::{Binding, CacheEntry, DescriptorSlot, EntryTable, PipelineSlot, UnbindQueue};
use crate::factory::{NativeFactory, PipelineLayouts};
use crate::graveyard::{Graveyard, Retired};
use crate::stats::{CacheStats, CacheStatsSnapshot};

/// Pipeline and descriptor-set cache over a [`NativeFactory`].
pub struct CacheStore<F: NativeFactory> {
    factory: F,
    layouts: PipelineLayouts,
    settings: CacheSettings,

    pipelines: EntryTable<PipelineKey, PipelineSlot>,
    descriptors: EntryTable<DescriptorKey, DescriptorSlot>,

    graveyard: Graveyard,
    /// Descriptor sets in the graveyard; they still occupy the pool.
    retired_descriptor_sets: usize,

    unbinds: Arc<UnbindQueue>,

    frame: u64,
    stats: CacheStats,
}

impl<F: NativeFactory> CacheStore<F> {
    /// Creates a store and its layouts.
    pub fn new(mut factory: F, settings: CacheSettings) -> Result<Self> {
        let layouts = factory.create_layouts()?;
        let capacity = settings.initial_capacity;
        Ok(Self {
            factory,
            layouts,
            settings,
            pipelines: EntryTable::with_capacity(capacity),
            descriptors: EntryTable::with_capacity(capacity),
            graveyard: Graveyard::new(),
            retired_descriptor_sets: 0,
            unbinds: Arc::default(),
            frame: 0,
            stats: CacheStats::default(),
        })
    }

    // ─── Pipelines ───────────────────────────────────────────────────────────

    /// Looks `key` up without creating anything. A hit refreshes the entry.
    pub fn lookup_pipeline(&self, key: &PipelineKey) -> Option<(PipelineSlot, RawHandle)> {
        self.stats.record_pipeline_lookup();
        let hit = self.find_pipeline(key);
        if let Some((slot, handle)) = hit {
            self.stats.record_pipeline_hit();
            log::trace!("Pipeline cache hit: {handle:?} ({slot:?})");
        }
        hit
    }

    /// Returns the pipeline for `key`, compiling it on a miss.
    ///
    /// A failed compilation inserts nothing.
    pub fn get_or_create_pipeline(
        &mut self,
        key: &PipelineKey,
    ) -> Result<(PipelineSlot, RawHandle)> {
        if let Some(hit) = self.lookup_pipeline(key) {
            return Ok(hit);
        }
        self.create_pipeline(key)
    }

    /// Miss path behind a lookup that was already counted.
    pub(crate) fn insert_pipeline_if_absent(
        &mut self,
        key: &PipelineKey,
    ) -> Result<(PipelineSlot, RawHandle)> {
        if let Some(hit) = self.find_pipeline(key) {
            self.stats.record_pipeline_hit();
            return Ok(hit);
        }
        self.create_pipeline(key)
    }

    fn find_pipeline(&self, key: &PipelineKey) -> Option<(PipelineSlot, RawHandle)> {
        let (slot, entry) = self.pipelines.find(key)?;
        entry.touch(self.frame);
        Some((slot, entry.handle()))
    }

    fn create_pipeline(&mut self, key: &PipelineKey) -> Result<(PipelineSlot, RawHandle)> {
        let handle = self
            .factory
            .compile_pipeline(key, &self.layouts)
            .inspect_err(|e| log::error!("Pipeline creation failed: {e}"))?;

        let slot = self.pipelines.insert(*key, CacheEntry::new(handle, self.frame));
        self.stats.record_pipeline_created();
        log::debug!(
            "Created pipeline {handle:?} (key hash {:016x}, {} live)",
            key.content_hash(),
            self.pipelines.len()
        );
        Ok((slot, handle))
    }

    /// Refreshes the entry behind `slot` without a map lookup.
    #[inline]
    pub fn touch_pipeline(&self, slot: PipelineSlot) -> Option<RawHandle> {
        let entry = self.pipelines.get(slot)?;
        entry.touch(self.frame);
        Some(entry.handle())
    }

    /// Handle behind `slot`.
    ///
    /// Using a slot whose entry has been retired is a contract violation
    /// (fatal in debug builds).
    pub fn pipeline_handle(&self, slot: PipelineSlot) -> Result<RawHandle> {
        self.pipelines
            .get(slot)
            .map(CacheEntry::handle)
            .ok_or_else(|| CacheError::stale("pipeline", slot_handle(slot)))
    }

    #[must_use]
    pub fn contains_pipeline(&self, key: &PipelineKey) -> bool {
        self.pipelines.find(key).is_some()
    }

    #[must_use]
    pub fn pipeline_entry(&self, slot: PipelineSlot) -> Option<&CacheEntry> {
        self.pipelines.get(slot)
    }

    #[inline]
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    // ─── Descriptor Sets ─────────────────────────────────────────────────────

    /// Looks `key` up without creating anything. A hit refreshes the entry.
    pub fn lookup_descriptor(&self, key: &DescriptorKey) -> Option<(DescriptorSlot, RawHandle)> {
        self.stats.record_descriptor_lookup();
        let hit = self.find_descriptor(key);
        if let Some((slot, handle)) = hit {
            self.stats.record_descriptor_hit();
            log::trace!("Descriptor cache hit: {handle:?} ({slot:?})");
        }
        hit
    }

    /// Returns the descriptor set for `key`, allocating and writing it on a
    /// miss. `updates` in the result is non-empty only for a new set.
    pub fn get_or_create_descriptor(&mut self, key: &DescriptorKey) -> Result<DescriptorLookup> {
        if let Some((slot, handle)) = self.lookup_descriptor(key) {
            return Ok(DescriptorLookup {
                slot,
                handle,
                updates: Default::default(),
            });
        }
        self.create_descriptor(key)
    }

    pub(crate) fn insert_descriptor_if_absent(
        &mut self,
        key: &DescriptorKey,
    ) -> Result<DescriptorLookup> {
        if let Some((slot, handle)) = self.find_descriptor(key) {
            self.stats.record_descriptor_hit();
            return Ok(DescriptorLookup {
                slot,
                handle,
                updates: Default::default(),
            });
        }
        self.create_descriptor(key)
    }

    fn find_descriptor(&self, key: &DescriptorKey) -> Option<(DescriptorSlot, RawHandle)> {
        let (slot, entry) = self.descriptors.find(key)?;
        entry.touch(self.frame);
        Some((slot, entry.handle()))
    }

    fn create_descriptor(&mut self, key: &DescriptorKey) -> Result<DescriptorLookup> {
        self.ensure_descriptor_capacity()?;

        let updates = key.update_op();
        let handle = self
            .factory
            .allocate_and_write_descriptor_set(key, &self.layouts, &updates)
            .inspect_err(|e| log::error!("Descriptor set allocation failed: {e}"))?;

        let slot = self
            .descriptors
            .insert(*key, CacheEntry::new(handle, self.frame));
        self.stats.record_descriptor_created();
        log::debug!(
            "Created descriptor set {handle:?} ({} writes, {} live)",
            updates.len(),
            self.descriptors.len()
        );
        Ok(DescriptorLookup {
            slot,
            handle,
            updates,
        })
    }

    /// Enforces `max_descriptor_sets`, sweeping once before giving up.
    fn ensure_descriptor_capacity(&mut self) -> Result<()> {
        let Some(capacity) = self.settings.max_descriptor_sets else {
            return Ok(());
        };
        if self.descriptor_pool_usage() < capacity {
            return Ok(());
        }

        log::warn!(
            "CacheStore: descriptor pool full ({capacity} sets), forcing a sweep at frame {}",
            self.frame
        );
        self.sweep(self.frame);

        if self.descriptor_pool_usage() < capacity {
            Ok(())
        } else {
            log::error!("Descriptor set allocation failed: pool exhausted ({capacity} sets)");
            Err(CacheError::AllocationExhausted { capacity })
        }
    }

    fn descriptor_pool_usage(&self) -> usize {
        self.descriptors.len() + self.retired_descriptor_sets
    }

    #[inline]
    pub fn touch_descriptor(&self, slot: DescriptorSlot) -> Option<RawHandle> {
        let entry = self.descriptors.get(slot)?;
        entry.touch(self.frame);
        Some(entry.handle())
    }

    /// Handle behind `slot`. See [`pipeline_handle`](Self::pipeline_handle).
    pub fn descriptor_handle(&self, slot: DescriptorSlot) -> Result<RawHandle> {
        self.descriptors
            .get(slot)
            .map(CacheEntry::handle)
            .ok_or_else(|| CacheError::stale("descriptor set", slot_handle(slot)))
    }

    #[must_use]
    pub fn contains_descriptor(&self, key: &DescriptorKey) -> bool {
        self.descriptors.find(key).is_some()
    }

    #[must_use]
    pub fn descriptor_entry(&self, slot: DescriptorSlot) -> Option<&CacheEntry> {
        self.descriptors.get(slot)
    }

    #[inline]
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    // ─── Frame Boundary ──────────────────────────────────────────────────────

    /// Evicts entries idle for more than `eviction_threshold` frames and frees
    /// graveyard objects older than `graveyard_latency` frames.
    ///
    /// Call once per frame, after that frame's recording is complete. Returns
    /// the number of entries evicted.
    pub fn collect_garbage(&mut self, current_frame: u64) -> usize {
        if current_frame < self.frame {
            log::warn!(
                "CacheStore: frame counter went backwards ({} -> {current_frame})",
                self.frame
            );
        }
        self.frame = current_frame;
        self.sweep(current_frame)
    }

    fn sweep(&mut self, frame: u64) -> usize {
        self.apply_deferred_unbinds();

        let settings = &self.settings;
        let graveyard = &mut self.graveyard;
        let expired = |entry: &CacheEntry| {
            !entry.is_bound() && settings.is_expired(entry.timestamp(), frame)
        };

        let pipelines = self.pipelines.remove_where(
            |_, entry| expired(entry),
            |entry| graveyard.bury(Retired::Pipeline(entry.into_handle()), frame),
        );
        let descriptors = self.descriptors.remove_where(|_, entry| expired(entry), |entry| {
            graveyard.bury(Retired::DescriptorSet(entry.into_handle()), frame);
        });
        self.retired_descriptor_sets += descriptors;

        let evicted = pipelines + descriptors;
        self.stats.record_evicted(evicted);
        if evicted > 0 {
            log::info!(
                "Cache sweep at frame {frame}: evicted {pipelines} pipelines, {descriptors} descriptor sets"
            );
        }

        if let Some(safe_frame) = frame.checked_sub(self.settings.graveyard_latency) {
            self.drain_graveyard(safe_frame);
        }
        evicted
    }

    fn apply_deferred_unbinds(&mut self) {
        let pending = self.unbinds.take();
        if pending.is_empty() {
            return;
        }
        log::debug!("CacheStore: releasing {} bindings of dropped binders", pending.len());
        for binding in pending {
            match binding {
                Binding::Pipeline(slot) => self.mark_pipeline_unbound(slot),
                Binding::Descriptor(slot) => self.mark_descriptor_unbound(slot),
            }
        }
    }

    /// Destroys every retired object whose retirement frame is at or before
    /// `safe_frame`. Returns the number destroyed.
    pub fn drain_graveyard(&mut self, safe_frame: u64) -> usize {
        let factory = &mut self.factory;
        let retired_sets = &mut self.retired_descriptor_sets;
        let destroyed = self
            .graveyard
            .drain(safe_frame, |object| destroy_retired(factory, retired_sets, object));
        self.stats.record_destroyed(destroyed);
        if destroyed > 0 {
            log::debug!("Graveyard: destroyed {destroyed} objects retired by frame {safe_frame}");
        }
        destroyed
    }

    // ─── Invalidation ────────────────────────────────────────────────────────

    /// Retires every descriptor set that binds `buffer` in any slot.
    ///
    /// Must be called before the buffer itself is freed.
    pub fn invalidate_uniform_buffer(&mut self, buffer: RawHandle) -> usize {
        self.invalidate_descriptors(|key| key.references_buffer(buffer), "buffer", buffer)
    }

    /// Retires every descriptor set that samples `image_view` in any slot.
    ///
    /// Only image-view handles are matched; passing a sampler handle retires
    /// nothing. Must be called before the image view itself is freed.
    pub fn invalidate_image(&mut self, image_view: RawHandle) -> usize {
        self.invalidate_descriptors(|key| key.references_image(image_view), "image", image_view)
    }

    fn invalidate_descriptors(
        &mut self,
        references: impl Fn(&DescriptorKey) -> bool,
        kind: &str,
        resource: RawHandle,
    ) -> usize {
        let frame = self.recording_frame();
        let graveyard = &mut self.graveyard;
        let mut bound = 0;
        let invalidated = self.descriptors.remove_where(
            |key, _| references(key),
            |entry| {
                if entry.is_bound() {
                    bound += 1;
                }
                graveyard.bury(Retired::DescriptorSet(entry.into_handle()), frame);
            },
        );
        self.retired_descriptor_sets += invalidated;
        self.stats.record_invalidated(invalidated);

        if bound > 0 {
            log::warn!(
                "CacheStore: invalidating {kind} {resource:?} retired {bound} bound descriptor sets"
            );
        } else if invalidated > 0 {
            log::debug!("Invalidated {invalidated} descriptor sets referencing {kind} {resource:?}");
        }
        invalidated
    }

    /// Retires every live entry. The objects are freed by later drains.
    pub fn clear(&mut self) {
        let frame = self.recording_frame();
        let graveyard = &mut self.graveyard;
        let mut pipelines = 0;
        self.pipelines.drain(|entry| {
            graveyard.bury(Retired::Pipeline(entry.into_handle()), frame);
            pipelines += 1;
        });
        let mut descriptors = 0;
        self.descriptors.drain(|entry| {
            graveyard.bury(Retired::DescriptorSet(entry.into_handle()), frame);
            descriptors += 1;
        });
        self.retired_descriptor_sets += descriptors;
        self.stats.record_evicted(pipelines + descriptors);
        log::info!("Cache cleared: retired {pipelines} pipelines, {descriptors} descriptor sets");
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn layouts(&self) -> &PipelineLayouts {
        &self.layouts
    }

    /// Frame passed to the last [`collect_garbage`](Self::collect_garbage).
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frame being recorded: the one the next `collect_garbage` will close.
    #[inline]
    #[must_use]
    pub fn recording_frame(&self) -> u64 {
        self.frame.saturating_add(1)
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Replaces the settings. Takes effect at the next sweep or allocation.
    pub fn set_settings(&mut self, settings: CacheSettings) {
        if settings != self.settings {
            log::info!("Cache settings changed: {settings:?}");
            self.settings = settings;
        }
    }

    #[inline]
    #[must_use]
    pub fn graveyard_len(&self) -> usize {
        self.graveyard.len()
    }

    #[must_use]
    pub fn graveyard(&self) -> &Graveyard {
        &self.graveyard
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            live_pipelines: self.pipelines.len(),
            live_descriptor_sets: self.descriptors.len(),
            graveyard_len: self.graveyard.len(),
            ..self.stats.snapshot()
        }
    }

    #[inline]
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    #[inline]
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}

fn destroy_retired<F: NativeFactory>(factory: &mut F, retired_sets: &mut usize, object: Retired) {
    match object {
        Retired::Pipeline(handle) => factory.destroy_pipeline(handle),
        Retired::DescriptorSet(handle) => {
            *retired_sets = retired_sets.saturating_sub(1);
            factory.destroy_descriptor_set(handle);
        }
    }
}

/// Slot bits, for error reports.
fn slot_handle(slot: impl Key) -> RawHandle {
    RawHandle::from_raw(slot.data().as_ffi())
}

impl<F: NativeFactory> Drop for CacheStore<F> {
    /// Destroys everything. The device must be idle.
    fn drop(&mut self) {
        let factory = &mut self.factory;
        let mut destroyed = 0;
        self.pipelines.drain(|entry| {
            factory.destroy_pipeline(entry.into_handle());
            destroyed += 1;
        });
        self.descriptors.drain(|entry| {
            factory.destroy_descriptor_set(entry.into_handle());
            destroyed += 1;
        });

        let retired_sets = &mut self.retired_descriptor_sets;
        let buried = self
            .graveyard
            .drain_all(|object| destroy_retired(factory, retired_sets, object));
        if buried > 0 {
            log::warn!("CacheStore: dropped with {buried} objects still in the graveyard");
        }

        self.factory.destroy_layouts(self.layouts);
        log::debug!("CacheStore torn down ({} objects destroyed)", destroyed + buried);
    }
}

impl<F: NativeFactory> CacheAccess for CacheStore<F> {
    fn pipeline(&mut self, key: &PipelineKey) -> Result<(PipelineSlot, RawHandle)> {
        self.get_or_create_pipeline(key)
    }

    fn touch_pipeline(&self, slot: PipelineSlot) -> Option<RawHandle> {
        CacheStore::touch_pipeline(self, slot)
    }

    fn mark_pipeline_bound(&self, slot: PipelineSlot) {
        if let Some(entry) = self.pipelines.get(slot) {
            entry.mark_bound();
        }
    }

    fn mark_pipeline_unbound(&self, slot: PipelineSlot) {
        if let Some(entry) = self.pipelines.get(slot) {
            entry.mark_unbound();
        }
    }

    fn descriptor(&mut self, key: &DescriptorKey) -> Result<DescriptorLookup> {
        self.get_or_create_descriptor(key)
    }

    fn touch_descriptor(&self, slot: DescriptorSlot) -> Option<RawHandle> {
        CacheStore::touch_descriptor(self, slot)
    }

    fn descriptor_alive(&self, slot: DescriptorSlot) -> bool {
        self.descriptors.get(slot).is_some()
    }

    fn mark_descriptor_bound(&self, slot: DescriptorSlot) {
        if let Some(entry) = self.descriptors.get(slot) {
            entry.mark_bound();
        }
    }

    fn mark_descriptor_unbound(&self, slot: DescriptorSlot) {
        if let Some(entry) = self.descriptors.get(slot) {
            entry.mark_unbound();
        }
    }

    fn pipeline_layout(&self) -> RawHandle {
        self.layouts.pipeline_layout
    }

    fn invalidate_uniform_buffer(&mut self, buffer: RawHandle) -> usize {
        CacheStore::invalidate_uniform_buffer(self, buffer)
    }

    fn invalidate_image(&mut self, image_view: RawHandle) -> usize {
        CacheStore::invalidate_image(self, image_view)
    }

    fn unbind_queue(&self) -> Arc<UnbindQueue> {
        Arc::clone(&self.unbinds)
    }
}
