//! Frame Simulation
//!
//! Drives the cache the way a renderer would, without a GPU: a scene of
//! objects sharing a handful of materials is recorded for a few hundred
//! frames by two passes, with objects moving in and out of view, one material
//! retired part-way through, and textures streamed out and replaced.
//!
//! Run with `RUST_LOG=info` to follow the cache; set `BINDERY_SETTINGS` to a
//! JSON object (e.g. `{"eviction_threshold": 4}`) to override settings.
//!
//! ```text
//! RUST_LOG=info cargo run -p frame_sim
//! ```

use anyhow::Context;
use bindery::prelude::*;
use bindery_dev_utils::RecordingFactory;
use bindery_dev_utils::fixtures::{render_pass, sampled_image, shader_pair, uniform_buffer};

const FRAMES: u64 = 240;
const MATERIALS: u64 = 6;
const OBJECTS: u64 = 48;
const TEXTURES: u64 = 12;

/// Material drawn only during the first part of the run.
const RETIRED_MATERIAL: u64 = MATERIALS - 1;
const RETIRED_AFTER_FRAME: u64 = 60;

/// One texture is replaced every this many frames.
const STREAMING_PERIOD: u64 = 15;

struct Object {
    material: u64,
    uniforms: RawHandle,
    texture: u64,
}

/// A texture slot whose image view is replaced when it is streamed.
struct Texture {
    generation: u64,
}

impl Texture {
    fn image(&self, index: u64) -> ImageDescriptor {
        sampled_image(index + self.generation * TEXTURES)
    }
}

struct Pass {
    transparent: bool,
    binder: Binder,
    raster: RasterState,
    render_pass: RawHandle,
}

fn load_settings() -> anyhow::Result<CacheSettings> {
    match std::env::var("BINDERY_SETTINGS") {
        Ok(json) => serde_json::from_str(&json).context("parsing BINDERY_SETTINGS"),
        Err(_) => Ok(CacheSettings::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    log::info!("Frame simulation starting with {settings:?}");

    let factory = RecordingFactory::new();
    let probe = factory.probe();
    let mut store = CacheStore::new(factory, settings)?;

    let objects: Vec<Object> = (0..OBJECTS)
        .map(|i| Object {
            material: i % MATERIALS,
            uniforms: uniform_buffer(i),
            texture: i % TEXTURES,
        })
        .collect();
    let mut textures: Vec<Texture> = (0..TEXTURES).map(|_| Texture { generation: 0 }).collect();

    let mut passes = [
        Pass {
            transparent: false,
            binder: Binder::new(),
            raster: RasterState::default(),
            render_pass: render_pass(0),
        },
        Pass {
            transparent: true,
            binder: Binder::new(),
            raster: RasterState::default()
                .with_blend(Some(BlendState::ALPHA_BLENDING))
                .with_depth_write(false),
            render_pass: render_pass(0),
        },
    ];

    for frame in 1..=FRAMES {
        // ---- stream textures ----
        if frame % STREAMING_PERIOD == 0 {
            let index = (frame / STREAMING_PERIOD) % TEXTURES;
            let old = textures[index as usize].image(index).image_view();
            let mut retired = 0;
            for pass in &mut passes {
                retired += pass.binder.unbind_image_view(&mut store, old);
            }
            textures[index as usize].generation += 1;
            log::info!("Frame {frame}: streamed texture {index}, retired {retired} descriptor sets");
        }

        // ---- record ----
        let mut binds = 0_usize;
        let mut draws = 0_usize;
        for pass in &mut passes {
            pass.binder.bind_render_pass(pass.render_pass, 0);
            pass.binder.bind_raster_state(pass.raster);

            for (i, object) in objects.iter().enumerate() {
                let visible = (i as u64 + frame) % 3 != 0;
                let retired = object.material == RETIRED_MATERIAL && frame > RETIRED_AFTER_FRAME;
                // Odd materials are blended.
                if !visible || retired || (object.material % 2 == 1) != pass.transparent {
                    continue;
                }

                let (vs, fs) = shader_pair(object.material);
                pass.binder.bind_shaders(vs, fs);
                pass.binder.bind_uniform_buffer(0, object.uniforms, 0, WHOLE_SIZE);
                pass.binder
                    .bind_sampler(0, textures[object.texture as usize].image(object.texture));

                let pipeline = pass.binder.resolve_pipeline(&mut store)?;
                let set = pass.binder.resolve_descriptor(&mut store)?;
                binds += usize::from(pipeline.changed) + usize::from(set.changed);
                draws += 1;
            }
        }

        // ---- frame boundary ----
        let evicted = store.collect_garbage(frame);
        if evicted > 0 || frame % 60 == 0 {
            let stats = store.stats();
            log::info!(
                "Frame {frame}: {draws} draws, {binds} binds, evicted {evicted}, \
                 {} pipelines / {} sets live, {} retired",
                stats.live_pipelines,
                stats.live_descriptor_sets,
                stats.graveyard_len,
            );
        }
    }

    for pass in &mut passes {
        pass.binder.release(&store);
    }

    let stats = store.stats();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("serializing cache stats")?
    );
    log::info!(
        "Hit rates: pipelines {:.1}%, descriptor sets {:.1}%",
        stats.pipeline_hit_rate() * 100.0,
        stats.descriptor_hit_rate() * 100.0
    );

    drop(store);
    let counts = probe.counts();
    anyhow::ensure!(
        counts.pipelines_compiled == counts.pipelines_destroyed
            && counts.sets_allocated == counts.sets_destroyed
            && counts.invalid_destroys == 0,
        "teardown leaked or double-freed native objects: {counts:?}"
    );
    log::info!("Teardown clean: {counts:?}");
    Ok(())
}
