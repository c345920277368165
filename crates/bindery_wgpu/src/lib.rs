//! Bindery wgpu Backend
//!
//! [`WgpuFactory`] compiles `wgpu::RenderPipeline`s and creates
//! `wgpu::BindGroup`s for a [`CacheStore`](bindery_cache::CacheStore).
//!
//! ```rust,ignore
//! let mut factory = WgpuFactory::new(device.clone());
//! let vs = factory.register_shader(module.clone(), "vs_main");
//! let fs = factory.register_shader(module, "fs_main");
//! let target = factory.register_render_target(RenderTargetFormats::new(
//!     &[wgpu::TextureFormat::Bgra8UnormSrgb],
//!     Some(wgpu::TextureFormat::Depth32Float),
//! ));
//!
//! let mut store = CacheStore::new(factory, CacheSettings::default())?;
//! let mut binder = Binder::new();
//! binder.bind_shaders(vs, fs);
//! binder.bind_render_pass(target, 0);
//!
//! let resolved = binder.resolve_pipeline(&mut store)?;
//! let pipeline = store.factory().pipeline(resolved.handle);
//! ```

mod convert;
mod factory;
pub mod layout;

pub use factory::{RenderTargetFormats, ShaderStage, WgpuFactory};
