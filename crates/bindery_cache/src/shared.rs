//! Shared Cache Store
//!
//! A device-wide [`CacheStore`] used by binders on several recording threads.
//!
//! Hits take the read lock only: timestamps and binding counts are atomics, so
//! a hit mutates no map state and concurrent hits never contend. A miss takes
//! the write lock and looks the key up once more before creating, so two
//! threads missing on the same key still compile it exactly once.

use std::sync::Arc;

use bindery_core::{CacheSettings, DescriptorKey, PipelineKey, RawHandle, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::access::{CacheAccess, DescriptorLookup};
use crate::entry::{DescriptorSlot, PipelineSlot, UnbindQueue};
use crate::factory::NativeFactory;
use crate::stats::CacheStatsSnapshot;
use crate::store::CacheStore;

/// Cloneable handle to a lock-protected [`CacheStore`].
pub struct SharedCacheStore<F: NativeFactory> {
    inner: Arc<RwLock<CacheStore<F>>>,
}

impl<F: NativeFactory> Clone for SharedCacheStore<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: NativeFactory> SharedCacheStore<F> {
    pub fn new(factory: F, settings: CacheSettings) -> Result<Self> {
        Ok(Self::from_store(CacheStore::new(factory, settings)?))
    }

    #[must_use]
    pub fn from_store(store: CacheStore<F>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CacheStore<F>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, CacheStore<F>> {
        self.inner.write()
    }

    pub fn get_or_create_pipeline(&self, key: &PipelineKey) -> Result<(PipelineSlot, RawHandle)> {
        if let Some(hit) = self.inner.read().lookup_pipeline(key) {
            return Ok(hit);
        }
        // Another thread may have created it between the two locks.
        self.inner.write().insert_pipeline_if_absent(key)
    }

    pub fn get_or_create_descriptor(&self, key: &DescriptorKey) -> Result<DescriptorLookup> {
        if let Some((slot, handle)) = self.inner.read().lookup_descriptor(key) {
            return Ok(DescriptorLookup {
                slot,
                handle,
                updates: Default::default(),
            });
        }
        self.inner.write().insert_descriptor_if_absent(key)
    }

    /// See [`CacheStore::collect_garbage`].
    pub fn collect_garbage(&self, current_frame: u64) -> usize {
        self.inner.write().collect_garbage(current_frame)
    }

    pub fn drain_graveyard(&self, safe_frame: u64) -> usize {
        self.inner.write().drain_graveyard(safe_frame)
    }

    pub fn invalidate_uniform_buffer(&self, buffer: RawHandle) -> usize {
        self.inner.write().invalidate_uniform_buffer(buffer)
    }

    pub fn invalidate_image(&self, image_view: RawHandle) -> usize {
        self.inner.write().invalidate_image(image_view)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn set_settings(&self, settings: CacheSettings) {
        self.inner.write().set_settings(settings);
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.read().stats()
    }

    /// Number of handles to this store, including `self`.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<F: NativeFactory> CacheAccess for SharedCacheStore<F> {
    fn pipeline(&mut self, key: &PipelineKey) -> Result<(PipelineSlot, RawHandle)> {
        self.get_or_create_pipeline(key)
    }

    fn touch_pipeline(&self, slot: PipelineSlot) -> Option<RawHandle> {
        self.inner.read().touch_pipeline(slot)
    }

    fn mark_pipeline_bound(&self, slot: PipelineSlot) {
        self.inner.read().mark_pipeline_bound(slot);
    }

    fn mark_pipeline_unbound(&self, slot: PipelineSlot) {
        self.inner.read().mark_pipeline_unbound(slot);
    }

    fn descriptor(&mut self, key: &DescriptorKey) -> Result<DescriptorLookup> {
        self.get_or_create_descriptor(key)
    }

    fn touch_descriptor(&self, slot: DescriptorSlot) -> Option<RawHandle> {
        self.inner.read().touch_descriptor(slot)
    }

    fn descriptor_alive(&self, slot: DescriptorSlot) -> bool {
        self.inner.read().descriptor_alive(slot)
    }

    fn mark_descriptor_bound(&self, slot: DescriptorSlot) {
        self.inner.read().mark_descriptor_bound(slot);
    }

    fn mark_descriptor_unbound(&self, slot: DescriptorSlot) {
        self.inner.read().mark_descriptor_unbound(slot);
    }

    fn pipeline_layout(&self) -> RawHandle {
        self.inner.read().layouts().pipeline_layout
    }

    fn invalidate_uniform_buffer(&mut self, buffer: RawHandle) -> usize {
        SharedCacheStore::invalidate_uniform_buffer(self, buffer)
    }

    fn invalidate_image(&mut self, image_view: RawHandle) -> usize {
        SharedCacheStore::invalidate_image(self, image_view)
    }

    fn unbind_queue(&self) -> Arc<UnbindQueue> {
        self.inner.read().unbind_queue()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::store::tests::CountingFactory;

    #[test]
    fn concurrent_misses_compile_once() {
        let store =
            SharedCacheStore::new(CountingFactory::default(), CacheSettings::default()).unwrap();
        let mut key = PipelineKey::initial();
        key.set_shaders(RawHandle::from_raw(100), RawHandle::from_raw(101));

        let handles: Vec<_> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    scope.spawn(move || store.get_or_create_pipeline(&key).unwrap().1)
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(handles.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.read().factory().compiled, 1);
        assert_eq!(store.stats().pipelines_created, 1);
    }
}
