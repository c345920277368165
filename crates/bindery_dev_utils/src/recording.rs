//! Recording Factory
//!
//! A [`NativeFactory`] that creates nothing: it hands out sequential handles
//! and records every call. The record lives behind an `Arc`, so a
//! [`FactoryProbe`] can inspect it after the factory has moved into a store,
//! and even after that store has been dropped.

use std::sync::Arc;

use bindery_cache::{NativeFactory, PipelineLayouts};
use bindery_core::{CacheError, DescriptorKey, DescriptorUpdateOp, PipelineKey, RawHandle, Result};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactoryCounts {
    pub layouts_created: usize,
    pub layouts_destroyed: usize,
    pub pipelines_compiled: usize,
    pub pipelines_destroyed: usize,
    pub sets_allocated: usize,
    pub sets_destroyed: usize,
    /// Destroy calls for handles that were not live.
    pub invalid_destroys: usize,
}

#[derive(Default)]
struct Recording {
    next: u64,
    counts: FactoryCounts,
    live_layouts: Option<PipelineLayouts>,
    live_pipelines: FxHashMap<RawHandle, PipelineKey>,
    live_sets: FxHashMap<RawHandle, DescriptorKey>,
    last_updates: Option<DescriptorUpdateOp>,

    failing_shaders: FxHashSet<RawHandle>,
    set_capacity: Option<usize>,
}

impl Recording {
    fn next_handle(&mut self) -> RawHandle {
        self.next += 1;
        RawHandle::from_raw(self.next)
    }
}

/// Mock [`NativeFactory`] for tests and demos.
#[derive(Default)]
pub struct RecordingFactory {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A view onto this factory's record.
    #[must_use]
    pub fn probe(&self) -> FactoryProbe {
        FactoryProbe {
            recording: Arc::clone(&self.recording),
        }
    }
}

impl NativeFactory for RecordingFactory {
    fn create_layouts(&mut self) -> Result<PipelineLayouts> {
        let mut rec = self.recording.lock();
        let layouts = PipelineLayouts {
            descriptor_set_layout: rec.next_handle(),
            pipeline_layout: rec.next_handle(),
        };
        rec.live_layouts = Some(layouts);
        rec.counts.layouts_created += 1;
        Ok(layouts)
    }

    fn destroy_layouts(&mut self, layouts: PipelineLayouts) {
        let mut rec = self.recording.lock();
        if rec.live_layouts.take_if(|live| *live == layouts).is_some() {
            rec.counts.layouts_destroyed += 1;
        } else {
            rec.counts.invalid_destroys += 1;
        }
    }

    fn compile_pipeline(&mut self, key: &PipelineKey, _: &PipelineLayouts) -> Result<RawHandle> {
        let mut rec = self.recording.lock();
        for shader in [key.vertex_shader(), key.fragment_shader()] {
            if rec.failing_shaders.contains(&shader) {
                return Err(CacheError::compilation(format!(
                    "shader {shader:?} failed to compile"
                )));
            }
        }
        let handle = rec.next_handle();
        rec.live_pipelines.insert(handle, *key);
        rec.counts.pipelines_compiled += 1;
        Ok(handle)
    }

    fn allocate_and_write_descriptor_set(
        &mut self,
        key: &DescriptorKey,
        _: &PipelineLayouts,
        updates: &DescriptorUpdateOp,
    ) -> Result<RawHandle> {
        let mut rec = self.recording.lock();
        if let Some(capacity) = rec.set_capacity
            && rec.live_sets.len() >= capacity
        {
            return Err(CacheError::AllocationExhausted { capacity });
        }
        let handle = rec.next_handle();
        rec.live_sets.insert(handle, *key);
        rec.last_updates = Some(updates.clone());
        rec.counts.sets_allocated += 1;
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, handle: RawHandle) {
        let mut rec = self.recording.lock();
        if rec.live_pipelines.remove(&handle).is_some() {
            rec.counts.pipelines_destroyed += 1;
        } else {
            log::error!("RecordingFactory: destroy of unknown pipeline {handle:?}");
            rec.counts.invalid_destroys += 1;
        }
    }

    fn destroy_descriptor_set(&mut self, handle: RawHandle) {
        let mut rec = self.recording.lock();
        if rec.live_sets.remove(&handle).is_some() {
            rec.counts.sets_destroyed += 1;
        } else {
            log::error!("RecordingFactory: destroy of unknown descriptor set {handle:?}");
            rec.counts.invalid_destroys += 1;
        }
    }
}

// ─── Probe ────────────────────────────────────────────────────────────────────

/// Shared view onto a [`RecordingFactory`]'s record; also steers its failures.
#[derive(Clone)]
pub struct FactoryProbe {
    recording: Arc<Mutex<Recording>>,
}

impl FactoryProbe {
    #[must_use]
    pub fn counts(&self) -> FactoryCounts {
        self.recording.lock().counts
    }

    #[must_use]
    pub fn live_pipelines(&self) -> usize {
        self.recording.lock().live_pipelines.len()
    }

    #[must_use]
    pub fn live_descriptor_sets(&self) -> usize {
        self.recording.lock().live_sets.len()
    }

    #[must_use]
    pub fn is_pipeline_live(&self, handle: RawHandle) -> bool {
        self.recording.lock().live_pipelines.contains_key(&handle)
    }

    #[must_use]
    pub fn is_descriptor_set_live(&self, handle: RawHandle) -> bool {
        self.recording.lock().live_sets.contains_key(&handle)
    }

    #[must_use]
    pub fn layouts_live(&self) -> bool {
        self.recording.lock().live_layouts.is_some()
    }

    /// Key a live descriptor set was written from.
    #[must_use]
    pub fn descriptor_set_key(&self, handle: RawHandle) -> Option<DescriptorKey> {
        self.recording.lock().live_sets.get(&handle).copied()
    }

    /// Writes of the most recently allocated descriptor set.
    #[must_use]
    pub fn last_updates(&self) -> Option<DescriptorUpdateOp> {
        self.recording.lock().last_updates.clone()
    }

    /// Makes every pipeline that uses `shader` fail to compile.
    pub fn fail_shader(&self, shader: RawHandle) {
        self.recording.lock().failing_shaders.insert(shader);
    }

    pub fn clear_failures(&self) {
        self.recording.lock().failing_shaders.clear();
    }

    /// Caps the number of simultaneously live descriptor sets.
    pub fn set_capacity(&self, capacity: Option<usize>) {
        self.recording.lock().set_capacity = capacity;
    }
}
