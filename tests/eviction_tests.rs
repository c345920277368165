//! Eviction Tests
//!
//! Frame-based garbage collection over a recording store:
//! - Idle entries retire after `eviction_threshold` frames
//! - Retired objects stay alive for `graveyard_latency` more frames
//! - Bound entries are never evicted
//! - Descriptor pool capacity
//! - Teardown

use bindery::prelude::*;
use bindery_dev_utils::fixtures::{
    init_test_logger, recording_store, render_pass, sampled_image, shader_pair, uniform_buffer,
};

fn resolve_program(
    store: &mut CacheStore<bindery_dev_utils::RecordingFactory>,
    program: u64,
) -> anyhow::Result<(RawHandle, RawHandle)> {
    let (vs, fs) = shader_pair(program);
    let mut binder = Binder::new();
    binder.bind_shaders(vs, fs);
    binder.bind_render_pass(render_pass(0), 0);
    binder.bind_uniform_buffer(0, uniform_buffer(program), 0, WHOLE_SIZE);
    let pipeline = binder.resolve_pipeline(&mut *store)?;
    let set = binder.resolve_descriptor(&mut *store)?;
    binder.release(&*store);
    Ok((pipeline.handle, set.handle))
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn idle_entries_are_evicted_then_destroyed_after_latency() -> anyhow::Result<()> {
    init_test_logger();
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    let (pipeline, set) = resolve_program(&mut store, 0)?;

    // Last used at frame 0; threshold 2.
    assert_eq!(store.collect_garbage(1), 0);
    assert_eq!(store.collect_garbage(2), 0);
    assert_eq!(store.collect_garbage(3), 2);
    assert_eq!(store.pipeline_count(), 0);
    assert_eq!(store.descriptor_count(), 0);

    // Retired at frame 3, still possibly in flight.
    assert_eq!(store.graveyard_len(), 2);
    assert!(probe.is_pipeline_live(pipeline));
    assert!(probe.is_descriptor_set_live(set));

    store.collect_garbage(4);
    assert!(probe.is_pipeline_live(pipeline));

    store.collect_garbage(5);
    assert!(!probe.is_pipeline_live(pipeline));
    assert!(!probe.is_descriptor_set_live(set));
    assert_eq!(store.graveyard_len(), 0);

    let stats = store.stats();
    assert_eq!(stats.evicted, 2);
    assert_eq!(stats.destroyed, 2);
    Ok(())
}

#[test]
fn used_entries_survive_every_sweep() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    let (vs, fs) = shader_pair(0);

    for frame in 1..=20 {
        // A fresh binder each frame: every resolve is a dirty lookup.
        let mut binder = Binder::new();
        binder.bind_shaders(vs, fs);
        binder.resolve_pipeline(&mut store)?;
        binder.release(&store);
        assert_eq!(store.collect_garbage(frame), 0);
    }

    assert_eq!(probe.counts().pipelines_compiled, 1);
    assert_eq!(store.stats().pipeline_hits, 19);
    Ok(())
}

#[test]
fn evicted_state_is_recreated_on_demand() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    let (old_pipeline, _) = resolve_program(&mut store, 1)?;

    store.collect_garbage(3);
    assert_eq!(store.pipeline_count(), 0);

    let (new_pipeline, _) = resolve_program(&mut store, 1)?;
    assert_ne!(new_pipeline, old_pipeline);
    assert_eq!(probe.counts().pipelines_compiled, 2);
    // The evicted object is still waiting out its latency.
    assert!(probe.is_pipeline_live(old_pipeline));
    Ok(())
}

#[test]
fn only_idle_entries_are_evicted() -> anyhow::Result<()> {
    let (mut store, _probe) = recording_store(CacheSettings::default())?;
    let (stale, _) = resolve_program(&mut store, 0)?;
    store.collect_garbage(2);
    let (fresh, _) = resolve_program(&mut store, 1)?;

    // Program 0 was last used at frame 0, program 1 at frame 2.
    assert_eq!(store.collect_garbage(3), 2);
    assert_eq!(store.pipeline_count(), 1);
    assert!(store.graveyard().contains(bindery::Retired::Pipeline(stale)));
    assert!(!store.graveyard().contains(bindery::Retired::Pipeline(fresh)));
    Ok(())
}

#[test]
fn explicit_drain_frees_before_latency() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    let (pipeline, _) = resolve_program(&mut store, 0)?;
    store.collect_garbage(3);

    assert_eq!(store.drain_graveyard(2), 0);
    assert_eq!(store.drain_graveyard(3), 2);
    assert!(!probe.is_pipeline_live(pipeline));
    Ok(())
}

// ============================================================================
// Pinning
// ============================================================================

#[test]
fn bound_entries_are_never_evicted() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    let mut binder = Binder::new();
    let (vs, fs) = shader_pair(0);
    binder.bind_shaders(vs, fs);
    binder.bind_sampler(0, sampled_image(0));
    let pipeline = binder.resolve_pipeline(&mut store)?;
    binder.resolve_descriptor(&mut store)?;

    // Bound but never touched again.
    assert_eq!(store.collect_garbage(100), 0);
    assert!(probe.is_pipeline_live(pipeline.handle));

    let resolved = binder.resolve_pipeline(&mut store)?;
    assert_eq!(resolved.handle, pipeline.handle);
    assert!(!resolved.changed);
    binder.resolve_descriptor(&mut store)?;

    // Released: eligible again, last touched at frame 100.
    binder.release(&store);
    assert_eq!(store.collect_garbage(102), 0);
    assert_eq!(store.collect_garbage(103), 2);
    Ok(())
}

#[test]
fn switching_away_unpins_the_previous_entry() -> anyhow::Result<()> {
    let (mut store, _probe) = recording_store(CacheSettings::default())?;
    let mut binder = Binder::new();

    let (vs, fs) = shader_pair(0);
    binder.bind_shaders(vs, fs);
    binder.resolve_pipeline(&mut store)?;
    let first = binder.current_pipeline().unwrap();

    let (vs, fs) = shader_pair(1);
    binder.bind_shaders(vs, fs);
    binder.resolve_pipeline(&mut store)?;
    let second = binder.current_pipeline().unwrap();

    assert!(!store.pipeline_entry(first).unwrap().is_bound());
    assert!(store.pipeline_entry(second).unwrap().is_bound());

    assert_eq!(store.collect_garbage(10), 1);
    assert!(store.pipeline_entry(first).is_none());
    assert!(store.pipeline_entry(second).is_some());

    binder.release(&store);
    Ok(())
}

// ============================================================================
// Descriptor Pool
// ============================================================================

#[test]
fn full_pool_of_fresh_sets_is_exhausted() -> anyhow::Result<()> {
    init_test_logger();
    let settings = CacheSettings {
        max_descriptor_sets: Some(2),
        graveyard_latency: 0,
        ..Default::default()
    };
    let (mut store, probe) = recording_store(settings)?;

    resolve_program(&mut store, 0)?;
    resolve_program(&mut store, 1)?;
    store.collect_garbage(5);
    assert_eq!(probe.live_descriptor_sets(), 0, "zero latency frees at once");

    resolve_program(&mut store, 2)?;
    resolve_program(&mut store, 3)?;
    assert_eq!(store.descriptor_count(), 2);

    // Both sets are still fresh at frame 5: nothing to reclaim.
    let mut binder = Binder::new();
    binder.bind_uniform_buffer(0, uniform_buffer(4), 0, WHOLE_SIZE);
    let err = binder.resolve_descriptor(&mut store).unwrap_err();
    assert_eq!(err, CacheError::AllocationExhausted { capacity: 2 });
    assert!(binder.is_descriptor_dirty());
    assert_eq!(probe.counts().sets_allocated, 4);
    Ok(())
}

#[test]
fn full_pool_recovers_by_a_forced_sweep() -> anyhow::Result<()> {
    let settings = CacheSettings {
        max_descriptor_sets: Some(2),
        graveyard_latency: 0,
        ..Default::default()
    };
    let (mut store, probe) = recording_store(settings.clone())?;
    resolve_program(&mut store, 0)?;
    resolve_program(&mut store, 1)?;
    assert_eq!(store.collect_garbage(2), 0);

    // Tighter threshold: both sets are now idle, but no sweep has run yet.
    store.set_settings(CacheSettings {
        eviction_threshold: 0,
        ..settings
    });
    let mut binder = Binder::new();
    binder.bind_uniform_buffer(0, uniform_buffer(2), 0, WHOLE_SIZE);
    let set = binder.resolve_descriptor(&mut store)?;

    assert!(set.changed);
    assert_eq!(store.descriptor_count(), 1);
    assert_eq!(probe.live_descriptor_sets(), 1);
    binder.release(&store);
    Ok(())
}

#[test]
fn retired_sets_count_against_the_pool() -> anyhow::Result<()> {
    let settings = CacheSettings {
        max_descriptor_sets: Some(1),
        ..Default::default()
    };
    let (mut store, _probe) = recording_store(settings)?;

    resolve_program(&mut store, 0)?;
    store.collect_garbage(3);
    assert_eq!(store.descriptor_count(), 0);
    assert_eq!(store.graveyard_len(), 2);

    // The evicted set still occupies the pool until frame 5.
    let mut binder = Binder::new();
    binder.bind_uniform_buffer(0, uniform_buffer(1), 0, WHOLE_SIZE);
    assert!(binder.resolve_descriptor(&mut store).is_err());

    store.collect_garbage(5);
    assert!(binder.resolve_descriptor(&mut store)?.changed);
    binder.release(&store);
    Ok(())
}

// ============================================================================
// Settings & Teardown
// ============================================================================

#[test]
fn settings_load_from_json() -> anyhow::Result<()> {
    let settings: CacheSettings =
        serde_json::from_str(r#"{ "eviction_threshold": 0, "graveyard_latency": 1 }"#)?;
    let (mut store, probe) = recording_store(settings)?;
    let (pipeline, _) = resolve_program(&mut store, 0)?;

    assert_eq!(store.collect_garbage(1), 2);
    assert!(probe.is_pipeline_live(pipeline));
    store.collect_garbage(2);
    assert!(!probe.is_pipeline_live(pipeline));
    Ok(())
}

#[test]
fn changed_settings_apply_at_the_next_sweep() -> anyhow::Result<()> {
    let (mut store, _probe) = recording_store(CacheSettings::default())?;
    resolve_program(&mut store, 0)?;

    store.set_settings(CacheSettings {
        eviction_threshold: 10,
        ..Default::default()
    });
    assert_eq!(store.collect_garbage(5), 0);
    assert_eq!(store.collect_garbage(11), 2);
    Ok(())
}

#[test]
fn drop_destroys_everything_exactly_once() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    resolve_program(&mut store, 0)?;
    resolve_program(&mut store, 1)?;
    store.collect_garbage(3);
    resolve_program(&mut store, 2)?;
    assert_eq!(store.graveyard_len(), 4);

    drop(store);

    let counts = probe.counts();
    assert_eq!(counts.pipelines_compiled, counts.pipelines_destroyed);
    assert_eq!(counts.sets_allocated, counts.sets_destroyed);
    assert_eq!(counts.layouts_created, 1);
    assert_eq!(counts.layouts_destroyed, 1);
    assert_eq!(counts.invalid_destroys, 0);
    assert!(!probe.layouts_live());
    assert_eq!(probe.live_pipelines(), 0);
    Ok(())
}

#[test]
fn clear_retires_everything_through_the_graveyard() -> anyhow::Result<()> {
    let (mut store, probe) = recording_store(CacheSettings::default())?;
    resolve_program(&mut store, 0)?;
    resolve_program(&mut store, 1)?;

    store.clear();
    assert_eq!(store.pipeline_count(), 0);
    assert_eq!(store.graveyard_len(), 4);
    assert_eq!(probe.live_pipelines(), 2);

    // Cleared while frame 1 is recorded; it may use them until frame 3.
    store.collect_garbage(2);
    assert_eq!(probe.live_pipelines(), 2);
    assert_eq!(probe.live_descriptor_sets(), 2);

    store.collect_garbage(3);
    assert_eq!(probe.live_pipelines(), 0);
    assert_eq!(probe.live_descriptor_sets(), 0);
    Ok(())
}
