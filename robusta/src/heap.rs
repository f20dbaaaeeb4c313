//! The object heap: an arena of slots addressed by generation-stamped
//! handles.
//!
//! Collection is delegated to the host allocator; the arena only grows. The
//! generation stamp exists so that a stale handle is detectable instead of
//! silently aliasing a reused slot, which keeps the failure mode explicit if
//! slot reuse is ever introduced.

use std::marker::PhantomData;

use usize_cast::IntoUsize;

use crate::object::Object;

/// A handle to an object in the [`Heap`]. Handles must not be used across
/// heap instances.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    slot: u32,
    gen: u32,
    _marker: PhantomData<Object>,
}

impl std::fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "objref({}:{})", self.slot, self.gen)
    }
}

impl ObjRef {
    fn new(slot: u32, gen: u32) -> ObjRef {
        ObjRef {
            slot,
            gen,
            _marker: PhantomData,
        }
    }

    /// Stable per-object value used to seed identity hash codes.
    #[must_use]
    pub fn identity(&self) -> u32 {
        self.slot.wrapping_mul(0x9E37_79B9).wrapping_add(self.gen)
    }
}

struct HeapEntry {
    gen: u32,
    value: Object,
}

#[derive(Default)]
pub struct Heap {
    entries: Vec<Option<HeapEntry>>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Heap {
        Heap {
            entries: Vec::with_capacity(256),
        }
    }

    pub fn alloc(&mut self, value: Object) -> ObjRef {
        let slot = self.entries.len();
        self.entries.push(Some(HeapEntry { gen: 0, value }));
        // A u32 of live objects bounds the arena; the JVM would have
        // exhausted memory long before the index wraps.
        ObjRef::new(slot as u32, 0)
    }

    #[must_use]
    pub fn get(&self, reference: ObjRef) -> Option<&Object> {
        self.entries
            .get(reference.slot.into_usize())
            .and_then(Option::as_ref)
            .filter(|entry| entry.gen == reference.gen)
            .map(|entry| &entry.value)
    }

    #[must_use]
    pub fn get_mut(&mut self, reference: ObjRef) -> Option<&mut Object> {
        self.entries
            .get_mut(reference.slot.into_usize())
            .and_then(Option::as_mut)
            .filter(|entry| entry.gen == reference.gen)
            .map(|entry| &mut entry.value)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn alloc_then_get_round_trips() {
        let mut heap = Heap::new();
        let r = heap.alloc(Object::new_empty());
        assert!(heap.get(r).is_some());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn distinct_allocations_get_distinct_handles() {
        let mut heap = Heap::new();
        let a = heap.alloc(Object::new_empty());
        let b = heap.alloc(Object::new_empty());
        assert_ne!(a, b);
    }
}
