use super::arena::{Arena, ArenaIndex};
use alloc::collections::BTreeMap;
use core::ops::Index;

/// A deduplicating arena: allocating the same entity twice returns the same
/// index both times. This backs the store's function-type interner
/// (spec.md §3: "identical parameter+result sequences always map to the same
/// id") and the custom-section name table.
#[derive(Debug, Clone)]
pub struct DedupArena<Idx, T> {
    entity_to_idx: BTreeMap<T, Idx>,
    entities: Arena<Idx, T>,
}

impl<Idx, T> Default for DedupArena<Idx, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Idx, T> DedupArena<Idx, T> {
    pub fn new() -> Self {
        Self {
            entity_to_idx: BTreeMap::new(),
            entities: Arena::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<Idx, T> DedupArena<Idx, T>
where
    Idx: ArenaIndex,
    T: Ord + Clone,
{
    /// Interns `entity`, allocating a fresh index only the first time an
    /// equal value is seen; structurally equal values always get the same
    /// index, matching spec.md's function-type interner invariant.
    pub fn alloc(&mut self, entity: T) -> Idx {
        if let Some(index) = self.entity_to_idx.get(&entity) {
            return *index;
        }
        let index = self.entities.alloc(entity.clone());
        self.entity_to_idx.insert(entity, index);
        index
    }

    pub fn get(&self, index: Idx) -> Option<&T> {
        self.entities.get(index)
    }
}

impl<Idx, T> Index<Idx> for DedupArena<Idx, T>
where
    Idx: ArenaIndex,
    T: Ord + Clone,
{
    type Output = T;

    fn index(&self, index: Idx) -> &T {
        self.entities.get(index).expect("dedup arena index out of bounds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone)]
    struct Id(usize);
    impl ArenaIndex for Id {
        fn into_usize(self) -> usize {
            self.0
        }
        fn from_usize(value: usize) -> Self {
            Id(value)
        }
    }

    #[test]
    fn interning_is_injective_on_structural_equality() {
        let mut arena = DedupArena::<Id, alloc::vec::Vec<u8>>::new();
        let a = arena.alloc(alloc::vec![1, 2, 3]);
        let b = arena.alloc(alloc::vec![1, 2, 3]);
        let c = arena.alloc(alloc::vec![4]);
        assert_eq!(a.into_usize(), b.into_usize());
        assert_ne!(a.into_usize(), c.into_usize());
    }
}
