//! Graveyard
//!
//! Two-phase destruction of evicted objects. An entry evicted at frame `F`
//! may still be referenced by command buffers in flight, so its native handle
//! is buried here, stamped with `F`, and only destroyed once the caller
//! reports (or the configured latency implies) that frame `F` has retired on
//! the GPU.

use bindery_core::RawHandle;

/// A native object awaiting destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retired {
    Pipeline(RawHandle),
    DescriptorSet(RawHandle),
}

#[derive(Debug)]
struct Grave {
    object: Retired,
    retired_at: u64,
}

/// FIFO of retired objects, ordered by retirement frame.
#[derive(Debug, Default)]
pub struct Graveyard {
    graves: Vec<Grave>,
}

impl Graveyard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buries `object`, retired during `frame`.
    pub fn bury(&mut self, object: Retired, frame: u64) {
        self.graves.push(Grave {
            object,
            retired_at: frame,
        });
    }

    /// Destroys every object retired at or before `safe_frame`.
    ///
    /// Returns the number of objects handed to `destroy`.
    pub fn drain(&mut self, safe_frame: u64, mut destroy: impl FnMut(Retired)) -> usize {
        let before = self.graves.len();
        self.graves.retain(|grave| {
            if grave.retired_at <= safe_frame {
                destroy(grave.object);
                false
            } else {
                true
            }
        });
        before - self.graves.len()
    }

    /// Destroys everything regardless of age. Only sound once the device is
    /// idle.
    pub fn drain_all(&mut self, mut destroy: impl FnMut(Retired)) -> usize {
        let count = self.graves.len();
        for grave in self.graves.drain(..) {
            destroy(grave.object);
        }
        count
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.graves.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graves.is_empty()
    }

    #[must_use]
    pub fn contains(&self, object: Retired) -> bool {
        self.retired_at(object).is_some()
    }

    /// Frame `object` was buried at, if it is still here.
    #[must_use]
    pub fn retired_at(&self, object: Retired) -> Option<u64> {
        self.graves
            .iter()
            .find(|grave| grave.object == object)
            .map(|grave| grave.retired_at)
    }
}
