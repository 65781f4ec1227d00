//! Dense Component Storage
//!
//! One store per component type. Components live contiguously in a dense
//! vector mirrored by an index→entity array; an entity→index map supports
//! O(1) lookup. Removal swap-fills from the back, so iteration order is
//! insertion order perturbed only by removals - deterministic on every
//! machine, and never dependent on hash iteration (the hash index is used
//! for point lookups only).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// Dense store for components of type `T`.
///
/// `EntityToIndex[e] → i` and `IndexToEntity[i] → e` are maintained in
/// lockstep. `Clone` deep-copies the component data (owned collections
/// inside components clone with it), which is exactly what a world
/// snapshot needs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ComponentStore<T> {
    data: Vec<T>,
    index_to_entity: Vec<Entity>,
    entity_to_index: HashMap<Entity, usize>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            index_to_entity: Vec::new(),
            entity_to_index: HashMap::new(),
        }
    }
}

impl<T> ComponentStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored components.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the store is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if the entity has a component here.
    #[inline]
    pub fn has(&self, e: Entity) -> bool {
        self.entity_to_index.contains_key(&e)
    }

    /// Look up a component.
    #[inline]
    pub fn get(&self, e: Entity) -> Option<&T> {
        self.entity_to_index.get(&e).map(|&i| &self.data[i])
    }

    /// Look up a component mutably.
    #[inline]
    pub fn get_mut(&mut self, e: Entity) -> Option<&mut T> {
        match self.entity_to_index.get(&e) {
            Some(&i) => Some(&mut self.data[i]),
            None => None,
        }
    }

    /// Insert a component. Adding a second component of the same type
    /// overwrites the existing one in place (position preserved).
    pub fn insert(&mut self, e: Entity, value: T) {
        debug_assert!(e.is_valid(), "cannot attach a component to NULL");
        match self.entity_to_index.get(&e) {
            Some(&i) => self.data[i] = value,
            None => {
                let i = self.data.len();
                self.data.push(value);
                self.index_to_entity.push(e);
                self.entity_to_index.insert(e, i);
            }
        }
    }

    /// Remove a component, swap-filling the vacated slot from the back.
    pub fn remove(&mut self, e: Entity) -> Option<T> {
        let i = self.entity_to_index.remove(&e)?;
        let value = self.data.swap_remove(i);
        self.index_to_entity.swap_remove(i);
        if i < self.data.len() {
            let moved = self.index_to_entity[i];
            self.entity_to_index.insert(moved, i);
        }
        Some(value)
    }

    /// Drop all components.
    pub fn clear(&mut self) {
        self.data.clear();
        self.index_to_entity.clear();
        self.entity_to_index.clear();
    }

    /// Iterate `(entity, &component)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.index_to_entity.iter().copied().zip(self.data.iter())
    }

    /// Iterate `(entity, &mut component)` in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.index_to_entity
            .iter()
            .copied()
            .zip(self.data.iter_mut())
    }

    /// Entities in storage order. Handy for collect-then-mutate passes.
    pub fn entities(&self) -> Vec<Entity> {
        self.index_to_entity.clone()
    }
}

impl<T: PartialEq> PartialEq for ComponentStore<T> {
    /// Order-sensitive structural equality: same entities with the same
    /// values in the same storage order.
    fn eq(&self, other: &Self) -> bool {
        self.index_to_entity == other.index_to_entity && self.data == other.data
    }
}

impl<T: fmt::Debug> fmt::Debug for ComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut store = ComponentStore::new();
        store.insert(Entity(1), "a");
        store.insert(Entity(2), "b");
        assert_eq!(store.get(Entity(1)), Some(&"a"));
        assert_eq!(store.get(Entity(2)), Some(&"b"));
        assert_eq!(store.get(Entity(3)), None);
        assert!(store.has(Entity(1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_overwrite_in_place() {
        let mut store = ComponentStore::new();
        store.insert(Entity(1), 10);
        store.insert(Entity(2), 20);
        store.insert(Entity(1), 11);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(Entity(1)), Some(&11));
        // Position preserved
        let order: Vec<Entity> = store.iter().map(|(e, _)| e).collect();
        assert_eq!(order, vec![Entity(1), Entity(2)]);
    }

    #[test]
    fn test_swap_remove() {
        let mut store = ComponentStore::new();
        for i in 1..=4 {
            store.insert(Entity(i), i * 100);
        }
        assert_eq!(store.remove(Entity(2)), Some(200));
        // Last element swapped into the vacated slot
        let order: Vec<Entity> = store.iter().map(|(e, _)| e).collect();
        assert_eq!(order, vec![Entity(1), Entity(4), Entity(3)]);
        assert_eq!(store.get(Entity(4)), Some(&400));
        assert_eq!(store.remove(Entity(2)), None);
    }

    #[test]
    fn test_remove_last() {
        let mut store = ComponentStore::new();
        store.insert(Entity(1), 'x');
        assert_eq!(store.remove(Entity(1)), Some('x'));
        assert!(store.is_empty());
    }

    #[test]
    fn test_iteration_order_deterministic() {
        let build = || {
            let mut store = ComponentStore::new();
            for i in [5u32, 1, 9, 3, 7] {
                store.insert(Entity(i), i);
            }
            store.remove(Entity(1));
            store
        };
        let a: Vec<_> = build().iter().map(|(e, v)| (e, *v)).collect();
        let b: Vec<_> = build().iter().map(|(e, v)| (e, *v)).collect();
        assert_eq!(a, b);
        assert_eq!(build(), build());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut store: ComponentStore<Vec<i32>> = ComponentStore::new();
        store.insert(Entity(1), vec![1, 2]);
        let snapshot = store.clone();
        store.get_mut(Entity(1)).unwrap().push(3);
        assert_eq!(snapshot.get(Entity(1)), Some(&vec![1, 2]));
        assert_ne!(store, snapshot);
    }
}
