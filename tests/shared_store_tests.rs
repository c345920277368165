//! Shared Store Tests
//!
//! Binders on several threads over one `SharedCacheStore`.

use std::sync::Barrier;
use std::thread;

use bindery::prelude::*;
use bindery_dev_utils::fixtures::{
    init_test_logger, recording_store, render_pass, sampled_image, shader_pair, uniform_buffer,
};

const THREADS: usize = 8;
const PROGRAMS: u64 = 4;

#[test]
fn concurrent_binders_create_each_state_once() -> anyhow::Result<()> {
    init_test_logger();
    let (store, probe) = recording_store(CacheSettings::default())?;
    let shared = SharedCacheStore::from_store(store);
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            let mut store = shared.clone();
            let barrier = &barrier;
            scope.spawn(move || {
                let mut binder = Binder::new();
                barrier.wait();
                for program in 0..PROGRAMS {
                    let (vs, fs) = shader_pair(program);
                    binder.bind_shaders(vs, fs);
                    binder.bind_render_pass(render_pass(0), 0);
                    binder.bind_uniform_buffer(0, uniform_buffer(program), 0, WHOLE_SIZE);
                    binder.bind_sampler(0, sampled_image(program));
                    binder.resolve_pipeline(&mut store).unwrap();
                    binder.resolve_descriptor(&mut store).unwrap();
                }
                binder.release(&store);
            });
        }
    });

    let counts = probe.counts();
    assert_eq!(counts.pipelines_compiled, PROGRAMS as usize);
    assert_eq!(counts.sets_allocated, PROGRAMS as usize);

    let stats = shared.stats();
    assert_eq!(stats.live_pipelines, PROGRAMS as usize);
    assert_eq!(
        stats.pipeline_hits + stats.pipelines_created,
        (THREADS as u64) * PROGRAMS
    );
    Ok(())
}

#[test]
fn bindings_from_all_threads_pin_entries() -> anyhow::Result<()> {
    let (store, _probe) = recording_store(CacheSettings::default())?;
    let shared = SharedCacheStore::from_store(store);
    let (vs, fs) = shader_pair(0);

    let mut binders: Vec<Binder> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let mut store = shared.clone();
                scope.spawn(move || {
                    let mut binder = Binder::new();
                    binder.bind_shaders(vs, fs);
                    binder.resolve_pipeline(&mut store).unwrap();
                    binder
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(shared.collect_garbage(50), 0);

    // Pinned until the last binder lets go.
    let (last, rest) = binders.split_last_mut().unwrap();
    for binder in rest {
        binder.release(&shared);
    }
    assert_eq!(shared.collect_garbage(60), 0);
    last.release(&shared);
    assert_eq!(shared.collect_garbage(70), 1);
    Ok(())
}

#[test]
fn frame_boundary_runs_alongside_recording_threads() -> anyhow::Result<()> {
    let (store, probe) = recording_store(CacheSettings::default())?;
    let shared = SharedCacheStore::from_store(store);

    for frame in 1..=10_u64 {
        thread::scope(|scope| {
            for worker in 0..4_u64 {
                let mut store = shared.clone();
                scope.spawn(move || {
                    let mut binder = Binder::new();
                    // Odd frames use a per-frame buffer; the set is new each time.
                    let buffer = if frame % 2 == 1 {
                        uniform_buffer(100 + frame)
                    } else {
                        uniform_buffer(worker)
                    };
                    binder.bind_uniform_buffer(0, buffer, 0, WHOLE_SIZE);
                    binder.resolve_descriptor(&mut store).unwrap();
                    binder.release(&store);
                });
            }
        });
        if frame % 2 == 1 {
            shared.invalidate_uniform_buffer(uniform_buffer(100 + frame));
        }
        shared.collect_garbage(frame);
    }

    assert_eq!(shared.handle_count(), 1);
    drop(shared);

    let counts = probe.counts();
    assert_eq!(counts.sets_allocated, counts.sets_destroyed);
    assert_eq!(counts.invalid_destroys, 0);
    Ok(())
}
