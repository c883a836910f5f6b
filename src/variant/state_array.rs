// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Per-object variant storage.
//!
//! Where [`VariantArray`][super::VariantArray] holds one attribute,
//! `StateArray` holds a whole state struct per variant.  New slots are
//! produced by [`VariantState::copy`], which lets a state decide what
//! survives a clone.  Caches, for instance, start empty in the new variant.

use super::{MultiVariantObject, VariantOp};

pub(crate) trait VariantState {
    /// Returns the state a new variant cloned from this one starts with.
    fn copy(&self) -> Self;
}

pub(crate) struct StateArray<S> {
    states: Vec<Option<S>>,
}

impl<S: VariantState> StateArray<S> {
    pub(crate) fn new(size: usize, mut factory: impl FnMut() -> S) -> Self {
        Self {
            states: (0..size).map(|_| Some(factory())).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn get(&self, index: usize) -> &S {
        match self.states.get(index) {
            Some(Some(state)) => state,
            Some(None) => panic!("Variant slot {index} has been deleted"),
            None => panic!(
                "Variant index {index} out of range (size: {})",
                self.states.len()
            ),
        }
    }

    /// Iterates over the live states.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &S> {
        self.states.iter().flatten()
    }

    fn push(&mut self, count: usize, source_index: usize) {
        for _ in 0..count {
            let state = self.get(source_index).copy();
            self.states.push(Some(state));
        }
    }

    fn pop(&mut self, count: usize) {
        let size = self.states.len();
        assert!(
            count <= size,
            "Cannot drop {count} variant slots out of {size}"
        );
        self.states.truncate(size - count);
    }

    fn delete(&mut self, index: usize) {
        let size = self.states.len();
        match self.states.get_mut(index) {
            Some(slot) => *slot = None,
            None => panic!("Variant index {index} out of range (size: {size})"),
        }
    }

    fn allocate(&mut self, indexes: &[usize], source_index: usize) {
        for &index in indexes {
            let state = self.get(source_index).copy();
            let size = self.states.len();
            match self.states.get_mut(index) {
                Some(slot) => *slot = Some(state),
                None => panic!("Variant index {index} out of range (size: {size})"),
            }
        }
    }
}

impl<S: VariantState> MultiVariantObject for StateArray<S> {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        match op {
            VariantOp::Extend {
                init_size,
                count,
                source_index,
            } => {
                debug_assert_eq!(self.states.len(), *init_size, "variant arrays out of step");
                self.push(*count, *source_index);
            }
            VariantOp::Reduce { count } => self.pop(*count),
            VariantOp::Delete { index } => self.delete(*index),
            VariantOp::Allocate {
                indexes,
                source_index,
            } => self.allocate(indexes, *source_index),
        }
    }

    fn variant_array_size(&self) -> Option<usize> {
        Some(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter {
        value: u32,
        cached: Option<u32>,
    }

    impl VariantState for Counter {
        fn copy(&self) -> Self {
            Counter {
                value: self.value,
                cached: None,
            }
        }
    }

    #[test]
    fn test_copy_drops_cache() {
        let mut states = StateArray::new(1, || Counter {
            value: 3,
            cached: Some(9),
        });
        states.extend_variant_array_size(1, 2, 0);
        assert_eq!(states.len(), 3);
        assert_eq!(
            states.get(2),
            &Counter {
                value: 3,
                cached: None
            }
        );
        assert_eq!(states.get(0).cached, Some(9));

        states.delete_variant_array_element(1);
        assert_eq!(states.iter().count(), 2);
        states.allocate_variant_array_element(&[1], 0);
        assert_eq!(states.iter().count(), 3);

        states.reduce_variant_array_size(2);
        assert_eq!(states.len(), 1);
    }
}
