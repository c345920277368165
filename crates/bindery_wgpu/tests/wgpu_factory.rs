//! End-to-end tests against a real wgpu device.
//!
//! Skipped when the environment has no adapter (e.g. CI without a software
//! rasterizer); the cache itself is covered without a device.

use std::borrow::Cow;

use bindery_cache::{Binder, CacheStore};
use bindery_core::{
    CacheError, CacheSettings, RawHandle, VertexFormat, VertexLayout, VertexStepMode,
    key::WHOLE_SIZE,
};
use bindery_wgpu::{RenderTargetFormats, WgpuFactory};

const SHADER: &str = r"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
";

fn create_test_device() -> Option<wgpu::Device> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;

    let (device, _queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("bindery test device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        ..Default::default()
    }))
    .ok()?;
    Some(device)
}

struct Fixture {
    store: CacheStore<WgpuFactory>,
    vs: RawHandle,
    fs: RawHandle,
    target: RawHandle,
}

fn fixture() -> Option<Fixture> {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = create_test_device()?;

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Bindery Test Shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER)),
    });

    let mut factory = WgpuFactory::new(device);
    let vs = factory.register_shader(module.clone(), "vs_main");
    let fs = factory.register_shader(module, "fs_main");
    let target = factory.register_render_target(RenderTargetFormats::new(
        &[wgpu::TextureFormat::Rgba8Unorm],
        Some(wgpu::TextureFormat::Depth32Float),
    ));

    let store = CacheStore::new(factory, CacheSettings::default()).ok()?;
    Some(Fixture {
        store,
        vs,
        fs,
        target,
    })
}

fn position_layout() -> VertexLayout {
    VertexLayout::new()
        .with_buffer(0, 12, VertexStepMode::Vertex)
        .with_attribute(0, 0, VertexFormat::Float32x3, 0)
}

#[test]
fn pipeline_is_compiled_once_and_retrievable() {
    let Some(Fixture {
        mut store,
        vs,
        fs,
        target,
    }) = fixture()
    else {
        return;
    };

    let mut a = Binder::new();
    a.bind_shaders(vs, fs);
    a.bind_render_pass(target, 0);
    a.bind_vertex_layout(position_layout());
    let first = a.resolve_pipeline(&mut store).unwrap();
    assert!(store.factory().pipeline(first.handle).is_some());

    let mut b = Binder::new();
    b.bind_render_pass(target, 0);
    b.bind_vertex_layout(position_layout());
    b.bind_shaders(vs, fs);
    assert_eq!(b.resolve_pipeline(&mut store).unwrap().handle, first.handle);
    assert_eq!(store.factory().object_counts().0, 1);

    a.release(&store);
    b.release(&store);
}

#[test]
fn unknown_render_target_fails_compilation() {
    let Some(Fixture {
        mut store, vs, fs, ..
    }) = fixture()
    else {
        return;
    };

    let mut binder = Binder::new();
    binder.bind_shaders(vs, fs);
    binder.bind_render_pass(RawHandle::from_raw(9_999), 0);
    let err = binder.resolve_pipeline(&mut store).unwrap_err();
    assert!(matches!(err, CacheError::CompilationFailure { .. }));
    assert!(binder.is_pipeline_dirty());
}

#[test]
fn invalidated_bind_group_is_destroyed_after_latency() {
    let Some(Fixture { mut store, .. }) = fixture() else {
        return;
    };

    let buffer = store
        .factory()
        .device()
        .create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bindery Test Uniform"),
            size: 256,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
    let ubo = store.factory_mut().register_buffer(buffer);

    let mut binder = Binder::new();
    binder.bind_uniform_buffer(0, ubo, 0, WHOLE_SIZE);
    let set = binder.resolve_descriptor(&mut store).unwrap();
    assert_eq!(set.updates.len(), 1);
    assert!(store.factory().bind_group(set.handle).is_some());

    assert_eq!(binder.unbind_uniform_buffer(&mut store, ubo), 1);
    store.factory_mut().unregister_buffer(ubo);

    // Retired while frame 1 is recorded; freed once frame 3 completes.
    store.collect_garbage(1);
    store.collect_garbage(2);
    assert!(store.factory().bind_group(set.handle).is_some());
    store.collect_garbage(3);
    assert!(store.factory().bind_group(set.handle).is_none());
}
