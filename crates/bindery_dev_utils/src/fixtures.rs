//! Handle fixtures.
//!
//! Caller-side handles in disjoint ranges, far above anything a
//! [`RecordingFactory`](crate::RecordingFactory) hands out, so a mix-up shows
//! up as an obvious mismatch.

use bindery_cache::CacheStore;
use bindery_core::{CacheSettings, ImageDescriptor, ImageLayout, RawHandle};

use crate::recording::{FactoryProbe, RecordingFactory};

const SHADER_BASE: u64 = 0x1_0000;
const BUFFER_BASE: u64 = 0x2_0000;
const IMAGE_VIEW_BASE: u64 = 0x3_0000;
const SAMPLER_BASE: u64 = 0x4_0000;
const RENDER_PASS_BASE: u64 = 0x5_0000;

/// Vertex + fragment shader handles of program `index`.
#[must_use]
pub fn shader_pair(index: u64) -> (RawHandle, RawHandle) {
    (
        RawHandle::from_raw(SHADER_BASE + 2 * index),
        RawHandle::from_raw(SHADER_BASE + 2 * index + 1),
    )
}

#[must_use]
pub fn uniform_buffer(index: u64) -> RawHandle {
    RawHandle::from_raw(BUFFER_BASE + index)
}

#[must_use]
pub fn image_view(index: u64) -> RawHandle {
    RawHandle::from_raw(IMAGE_VIEW_BASE + index)
}

/// Image view `index` with its own sampler, in shader-read layout.
#[must_use]
pub fn sampled_image(index: u64) -> ImageDescriptor {
    ImageDescriptor::new(
        RawHandle::from_raw(SAMPLER_BASE + index),
        image_view(index),
        ImageLayout::ShaderReadOnly,
    )
}

#[must_use]
pub fn render_pass(index: u64) -> RawHandle {
    RawHandle::from_raw(RENDER_PASS_BASE + index)
}

/// Initializes `env_logger` once for tests; later calls are no-ops.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A store over a fresh [`RecordingFactory`], plus the probe onto it.
pub fn recording_store(
    settings: CacheSettings,
) -> bindery_core::Result<(CacheStore<RecordingFactory>, FactoryProbe)> {
    let factory = RecordingFactory::new();
    let probe = factory.probe();
    Ok((CacheStore::new(factory, settings)?, probe))
}
