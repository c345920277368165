//! Error Types
//!
//! Every fallible cache operation returns [`Result<T>`], an alias for
//! `std::result::Result<T, CacheError>`.
//!
//! Only two variants are runtime conditions a caller can meet in a correct
//! program ([`CacheError::CompilationFailure`] and
//! [`CacheError::AllocationExhausted`]). Both abort the draw that requested the
//! resolve; the cache never retries on its own because a deterministic
//! compilation failure will fail again.
//!
//! [`CacheError::StaleHandleUse`] is a contract violation: a resource was freed
//! (or an entry evicted) without the owner calling the matching invalidation
//! entry point first. Debug builds assert on it at the detection site.

use thiserror::Error;

use crate::handle::RawHandle;

/// The error type of the state cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    // ========================================================================
    // Native factory failures
    // ========================================================================
    /// The native factory rejected a pipeline key (e.g. a shader or
    /// render-target format the backend cannot compile against).
    #[error("Pipeline compilation failed: {reason}")]
    CompilationFailure {
        /// Backend-provided description of the rejection
        reason: String,
    },

    /// The descriptor-set pool has no room for another set.
    #[error("Descriptor set pool exhausted (capacity: {capacity})")]
    AllocationExhausted {
        /// Pool capacity at the time of the failure
        capacity: usize,
    },

    // ========================================================================
    // Contract violations
    // ========================================================================
    /// A handle was used after the eviction/invalidation that retired it.
    #[error("Stale {kind} handle used: {handle:?}")]
    StaleHandleUse {
        /// What kind of object the handle referred to
        kind: &'static str,
        /// The offending handle
        handle: RawHandle,
    },
}

impl CacheError {
    /// Shorthand for [`CacheError::CompilationFailure`].
    pub fn compilation(reason: impl Into<String>) -> Self {
        Self::CompilationFailure {
            reason: reason.into(),
        }
    }

    /// Reports a stale handle. Fatal in debug builds.
    #[track_caller]
    #[must_use]
    pub fn stale(kind: &'static str, handle: RawHandle) -> Self {
        if cfg!(debug_assertions) {
            panic!("stale {kind} handle used: {handle:?}");
        }
        log::error!("Stale {kind} handle used: {handle:?}");
        Self::StaleHandleUse { kind, handle }
    }
}

/// Alias for `Result<T, CacheError>`.
pub type Result<T> = std::result::Result<T, CacheError>;
