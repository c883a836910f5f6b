// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Slot storage for the objects owned by a network.
//!
//! Slots are never reused, so a handle either resolves to the object it was
//! issued for or to nothing once that object is removed.

use std::marker::PhantomData;

/// Implemented by the typed handles that address an [`Arena`].
pub(crate) trait ArenaKey: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

pub(crate) struct Arena<K, T> {
    slots: Vec<Option<T>>,
    _key: PhantomData<K>,
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Returns the key the next inserted object will get.
    pub(crate) fn next_key(&self) -> K {
        K::from_index(self.slots.len())
    }

    pub(crate) fn insert(&mut self, value: T) -> K {
        let key = self.next_key();
        self.slots.push(Some(value));
        key
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key.index()).and_then(Option::as_mut)
    }

    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        self.slots.get_mut(key.index()).and_then(Option::take)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::from_index(i), v)))
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiable::ConnectableId;

    #[test]
    fn test_removed_slots_are_not_reused() {
        let mut arena: Arena<ConnectableId, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        let c = arena.insert("c");
        assert_ne!(a, c);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(
            arena.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
    }
}
