//! Opaque native handles.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// An opaque native object handle (pipeline, shader module, buffer, image view…).
///
/// Handles are plain bits: the cache never dereferences them, it only compares
/// and hashes them. `0` is reserved for "nothing bound".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct RawHandle(u64);

impl RawHandle {
    /// The null handle (an unbound slot).
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("RawHandle(null)")
        } else {
            write!(f, "RawHandle({:#x})", self.0)
        }
    }
}

impl From<u64> for RawHandle {
    #[inline]
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}
