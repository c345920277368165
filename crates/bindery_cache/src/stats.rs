//! Cache Statistics
//!
//! Relaxed atomic counters, bumped from both the read-locked hit path and the
//! write-locked miss path.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    pipeline_lookups: AtomicU64,
    pipeline_hits: AtomicU64,
    pipelines_created: AtomicU64,
    descriptor_lookups: AtomicU64,
    descriptor_hits: AtomicU64,
    descriptor_sets_created: AtomicU64,
    evicted: AtomicU64,
    invalidated: AtomicU64,
    destroyed: AtomicU64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl CacheStats {
    counter! {
        record_pipeline_lookup => pipeline_lookups,
        record_pipeline_hit => pipeline_hits,
        record_pipeline_created => pipelines_created,
        record_descriptor_lookup => descriptor_lookups,
        record_descriptor_hit => descriptor_hits,
        record_descriptor_created => descriptor_sets_created,
    }

    #[inline]
    pub fn record_evicted(&self, count: usize) {
        self.evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalidated(&self, count: usize) {
        self.invalidated.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_destroyed(&self, count: usize) {
        self.destroyed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            pipeline_lookups: load(&self.pipeline_lookups),
            pipeline_hits: load(&self.pipeline_hits),
            pipelines_created: load(&self.pipelines_created),
            descriptor_lookups: load(&self.descriptor_lookups),
            descriptor_hits: load(&self.descriptor_hits),
            descriptor_sets_created: load(&self.descriptor_sets_created),
            evicted: load(&self.evicted),
            invalidated: load(&self.invalidated),
            destroyed: load(&self.destroyed),
            ..CacheStatsSnapshot::default()
        }
    }
}

/// Point-in-time copy of a store's counters.
///
/// `*_lookups` counts map lookups only; a binder re-using its current entry
/// does not perform one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub pipeline_lookups: u64,
    pub pipeline_hits: u64,
    pub pipelines_created: u64,
    pub descriptor_lookups: u64,
    pub descriptor_hits: u64,
    pub descriptor_sets_created: u64,
    /// Entries moved to the graveyard by `collect_garbage` or `clear`.
    pub evicted: u64,
    /// Descriptor entries moved to the graveyard by an invalidation.
    pub invalidated: u64,
    /// Native objects actually destroyed out of the graveyard.
    pub destroyed: u64,
    pub live_pipelines: usize,
    pub live_descriptor_sets: usize,
    /// Retired objects still waiting for their frame to complete.
    pub graveyard_len: usize,
}

impl CacheStatsSnapshot {
    /// Fraction of pipeline lookups that hit, `0.0` before any lookup.
    #[must_use]
    pub fn pipeline_hit_rate(&self) -> f64 {
        ratio(self.pipeline_hits, self.pipeline_lookups)
    }

    #[must_use]
    pub fn descriptor_hit_rate(&self) -> f64 {
        ratio(self.descriptor_hits, self.descriptor_lookups)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(hits: u64, lookups: u64) -> f64 {
    if lookups == 0 {
        0.0
    } else {
        hits as f64 / lookups as f64
    }
}
