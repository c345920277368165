//! Cache Settings
//!
//! Tunables of the pipeline / descriptor cache.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bindery::CacheSettings;
//!
//! // Triple-buffered renderer: keep idle entries one frame longer and hold
//! // retired objects until three frames have passed.
//! let settings = CacheSettings {
//!     eviction_threshold: 3,
//!     graveyard_latency: 3,
//!     ..Default::default()
//! };
//! ```
//!
//! The right values depend on how many frames of GPU work the platform keeps
//! in flight, which is why none of them is hard-coded.

use serde::{Deserialize, Serialize};

/// Frames of inactivity after which an entry is evicted.
pub const DEFAULT_EVICTION_THRESHOLD: u64 = 2;

/// Frames a retired native object waits in the graveyard.
pub const DEFAULT_GRAVEYARD_LATENCY: u64 = 2;

/// Configuration for a `CacheStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// An entry whose last use is more than this many frames older than the
    /// frame passed to `collect_garbage` is evicted.
    pub eviction_threshold: u64,

    /// Retired objects are destroyed by `collect_garbage` once this many frames
    /// have passed since their retirement. `drain_graveyard` can free them
    /// earlier when the caller knows the GPU is done with them.
    pub graveyard_latency: u64,

    /// Capacity of the descriptor-set pool, counting both live and retired
    /// sets. `None` leaves pool management to the native factory.
    pub max_descriptor_sets: Option<usize>,

    /// Pre-sizing hint for the pipeline and descriptor maps.
    pub initial_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
            graveyard_latency: DEFAULT_GRAVEYARD_LATENCY,
            max_descriptor_sets: None,
            initial_capacity: 64,
        }
    }
}

impl CacheSettings {
    /// Returns `true` when an entry last used at `timestamp` is stale at `frame`.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, timestamp: u64, frame: u64) -> bool {
        frame.saturating_sub(timestamp) > self.eviction_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strictly_greater_than_threshold() {
        let settings = CacheSettings::default();
        assert!(!settings.is_expired(10, 12));
        assert!(settings.is_expired(10, 13));
        // A timestamp from the future never expires.
        assert!(!settings.is_expired(20, 13));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{ "eviction_threshold": 5 }"#).unwrap();
        assert_eq!(settings.eviction_threshold, 5);
        assert_eq!(settings.graveyard_latency, DEFAULT_GRAVEYARD_LATENCY);
        assert_eq!(settings.max_descriptor_sets, None);
    }
}
