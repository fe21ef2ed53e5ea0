//! Generation-checked handles for host objects
//!
//! Guests never see host addresses.  A host object is registered once and the
//! guest receives an opaque 64-bit handle: the slot index in the low 32 bits
//! and the slot's generation in the high 32 bits.  Generations start at one, so
//! the raw value `0` is never issued and always denotes "no object".  Removing
//! an object bumps its slot's generation, which makes every outstanding handle
//! to it stale.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
    vec::Vec,
};

/// An opaque reference to a registered host object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// The handle that never resolves.
    pub const NULL: Handle = Handle(0);

    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Handle(((generation as u64) << 32) | index as u64)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index(), self.generation())
    }
}

struct Slot<T: ?Sized> {
    generation: u32,
    value: Option<Arc<T>>,
}

struct Slots<T: ?Sized> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

/// A table of shared host objects addressed by `Handle`.
///
/// The registry can be shared between instances; each operation takes the
/// internal lock only for the duration of the table lookup.
pub struct HandleRegistry<T: ?Sized> {
    inner: RwLock<Slots<T>>,
}

impl<T: ?Sized> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> HandleRegistry<T> {
    pub fn new() -> Self {
        HandleRegistry {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Registers `value` and returns a fresh handle for it.
    pub fn insert(&self, value: Arc<T>) -> Handle {
        // The table is consistent between statements, so a poisoned lock is
        // still safe to use.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.live += 1;
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }
        let index = inner.slots.len() as u32;
        inner.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Handle::new(index, 1)
    }

    /// Unregisters the object `handle` refers to.  Every copy of `handle`
    /// becomes stale.  Returns `None` if the handle was already stale.
    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = inner.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        // A slot whose generation is exhausted is retired, never reused.
        if let Some(generation) = slot.generation.checked_add(1) {
            slot.generation = generation;
            inner.free.push(handle.index());
        }
        inner.live -= 1;
        Some(value)
    }

    /// The live object `handle` refers to, or `None` for a null or stale
    /// handle.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<T>> {
        if handle.generation() == 0 {
            return None;
        }
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let slot = inner.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.clone()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_never_resolves() {
        let registry = HandleRegistry::<u32>::new();
        let handle = registry.insert(Arc::new(5));
        assert!(!handle.is_null());
        assert_eq!(handle.generation(), 1);
        assert!(registry.resolve(Handle::NULL).is_none());
        assert!(registry.resolve(Handle::from_raw(handle.index() as u64)).is_none());
    }

    #[test]
    fn removal_makes_handles_stale() {
        let registry = HandleRegistry::<str>::new();
        let first: Arc<str> = Arc::from("first");
        let handle = registry.insert(first);
        assert_eq!(&*registry.resolve(handle).unwrap(), "first");

        assert!(registry.remove(handle).is_some());
        assert!(registry.resolve(handle).is_none());
        assert!(registry.remove(handle).is_none());

        let reused = registry.insert(Arc::from("second"));
        assert_eq!(reused.index(), handle.index());
        assert_ne!(reused, handle);
        assert!(registry.resolve(handle).is_none());
        assert_eq!(&*registry.resolve(reused).unwrap(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn exhausted_slots_are_retired() {
        let registry = HandleRegistry::<u32>::new();
        let handle = registry.insert(Arc::new(1));
        {
            let mut inner = registry.inner.write().unwrap();
            inner.slots[0].generation = u32::MAX;
        }
        let last = Handle::new(handle.index(), u32::MAX);
        assert!(registry.remove(last).is_some());
        assert!(registry.resolve(last).is_none());
        let next = registry.insert(Arc::new(2));
        assert_ne!(next.index(), handle.index());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_generation_is_counted_once() {
        let registry = HandleRegistry::<u32>::new();
        let handle = registry.insert(Arc::new(1));
        {
            let mut inner = registry.inner.write().unwrap();
            inner.slots[0].generation = u32::MAX - 1;
        }
        let before_last = Handle::new(handle.index(), u32::MAX - 1);
        assert!(registry.remove(before_last).is_some());
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());

        let last = registry.insert(Arc::new(2));
        assert_eq!(last.index(), handle.index());
        assert_eq!(last.generation(), u32::MAX);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(last).is_some());
        assert!(registry.is_empty());
    }
}
