//! Cache Entries
//!
//! Each store table pairs a content-addressed lookup (`key → slot`) with a
//! generational [`SlotMap`] of entries (`slot → entry`). Binders keep the slot
//! of the entry they last resolved as a non-owning reference: once the entry is
//! evicted, the slot's generation no longer matches and every lookup through it
//! fails cleanly instead of dangling.

use std::hash::Hash;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bindery_core::RawHandle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Non-owning reference to a cached pipeline entry.
    pub struct PipelineSlot;

    /// Non-owning reference to a cached descriptor-set entry.
    pub struct DescriptorSlot;
}

/// One cached native object.
///
/// Owns the only strong reference to its handle. Deliberately neither `Clone`
/// nor `Copy`: an entry moves from the live table to the graveyard and is
/// never duplicated into two slots.
///
/// `timestamp` and `bindings` are atomics so that the hit path can refresh them
/// through a shared reference (under a read lock when the store is shared).
/// `bindings` counts the binders that currently hold this entry as their
/// current pipeline or descriptor set; a bound entry is never swept.
#[derive(Debug)]
pub struct CacheEntry {
    handle: RawHandle,
    timestamp: AtomicU64,
    bindings: AtomicU32,
}

/// Cache entry of the pipeline table.
pub type PipelineVal = CacheEntry;

/// Cache entry of the descriptor-set table.
pub type DescriptorVal = CacheEntry;

impl CacheEntry {
    pub(crate) fn new(handle: RawHandle, frame: u64) -> Self {
        Self {
            handle,
            timestamp: AtomicU64::new(frame),
            bindings: AtomicU32::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Frame of last use.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp.load(Ordering::Relaxed)
    }

    /// Whether any binder currently has this entry bound on its command stream.
    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bindings.load(Ordering::Relaxed) > 0
    }

    #[inline]
    pub(crate) fn touch(&self, frame: u64) {
        self.timestamp.fetch_max(frame, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn mark_bound(&self) {
        self.bindings.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn mark_unbound(&self) {
        let released = self
            .bindings
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        debug_assert!(
            released.is_ok(),
            "unbinding {:?} more often than it was bound",
            self.handle
        );
        if released.is_err() {
            log::error!("CacheEntry: unbalanced unbind of {:?} ignored", self.handle);
        }
    }

    pub(crate) fn into_handle(self) -> RawHandle {
        self.handle
    }
}

// ─── Deferred Unbinds ─────────────────────────────────────────────────────────

/// A binding held by a binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    Pipeline(PipelineSlot),
    Descriptor(DescriptorSlot),
}

/// Bindings left behind by binders dropped without
/// [`release`](crate::Binder::release). The store unbinds them at its next
/// sweep.
#[derive(Debug, Default)]
pub struct UnbindQueue {
    pending: Mutex<Vec<Binding>>,
}

impl UnbindQueue {
    pub(crate) fn push(&self, binding: Binding) {
        self.pending.lock().push(binding);
    }

    pub(crate) fn take(&self) -> Vec<Binding> {
        std::mem::take(&mut *self.pending.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

// ─── Entry Table ──────────────────────────────────────────────────────────────

/// `key → slot → entry` storage for one object kind.
pub(crate) struct EntryTable<K, S: slotmap::Key> {
    lookup: FxHashMap<K, S>,
    entries: SlotMap<S, CacheEntry>,
}

impl<K, S> EntryTable<K, S>
where
    K: Copy + Eq + Hash,
    S: slotmap::Key,
{
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lookup: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            entries: SlotMap::with_capacity_and_key(capacity),
        }
    }

    #[inline]
    pub fn find(&self, key: &K) -> Option<(S, &CacheEntry)> {
        let slot = *self.lookup.get(key)?;
        self.entries.get(slot).map(|entry| (slot, entry))
    }

    #[inline]
    pub fn get(&self, slot: S) -> Option<&CacheEntry> {
        self.entries.get(slot)
    }

    pub fn insert(&mut self, key: K, entry: CacheEntry) -> S {
        let slot = self.entries.insert(entry);
        let previous = self.lookup.insert(key, slot);
        // Callers only insert after a miss.
        debug_assert!(previous.is_none(), "duplicate cache key inserted");
        if let Some(old) = previous {
            self.entries.remove(old);
        }
        slot
    }

    /// Removes every entry matching `predicate`, handing each one to `sink`.
    pub fn remove_where(
        &mut self,
        mut predicate: impl FnMut(&K, &CacheEntry) -> bool,
        mut sink: impl FnMut(CacheEntry),
    ) -> usize {
        let entries = &mut self.entries;
        let mut removed = 0;
        self.lookup.retain(|key, slot| {
            let Some(entry) = entries.get(*slot) else {
                return false;
            };
            if !predicate(key, entry) {
                return true;
            }
            if let Some(entry) = entries.remove(*slot) {
                sink(entry);
                removed += 1;
            }
            false
        });
        removed
    }

    pub fn drain(&mut self, mut sink: impl FnMut(CacheEntry)) {
        self.lookup.clear();
        for (_, entry) in self.entries.drain() {
            sink(entry);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
