// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Per-attribute variant storage.

use super::{MultiVariantObject, VariantOp};

/// One value per variant slot for a single attribute.
///
/// Indexing a slot that does not exist, or that was vacated by
/// [`delete`][VariantArray::delete] and not allocated again, is a bug in the
/// caller and panics.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantArray<T> {
    values: Vec<Option<T>>,
}

impl<T: Clone> VariantArray<T> {
    /// Creates an array of `size` slots, all set to `initial`.
    pub fn new(size: usize, initial: T) -> Self {
        Self {
            values: vec![Some(initial); size],
        }
    }

    /// Returns the number of allocated slots, vacated ones included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value of the slot at `index`.
    pub fn get(&self, index: usize) -> &T {
        match self.values.get(index) {
            Some(Some(value)) => value,
            Some(None) => panic!("Variant slot {index} has been deleted"),
            None => panic!(
                "Variant index {index} out of range (size: {})",
                self.values.len()
            ),
        }
    }

    /// Returns a mutable reference to the value of the slot at `index`.
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        let size = self.values.len();
        match self.values.get_mut(index) {
            Some(Some(value)) => value,
            Some(None) => panic!("Variant slot {index} has been deleted"),
            None => panic!("Variant index {index} out of range (size: {size})"),
        }
    }

    /// Replaces the value of the slot at `index` and returns the old one.
    pub fn set(&mut self, index: usize, value: T) -> T {
        std::mem::replace(self.get_mut(index), value)
    }

    /// Iterates over the values of the slots that are not vacated.
    pub(crate) fn live_values(&self) -> impl Iterator<Item = &T> {
        self.values.iter().flatten()
    }

    pub(crate) fn live_values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut().flatten()
    }

    /// Appends `count` slots, each initialized with a copy of the value at
    /// `source_index`.
    pub fn extend(&mut self, init_size: usize, count: usize, source_index: usize) {
        debug_assert_eq!(self.values.len(), init_size, "variant arrays out of step");
        let source = self.get(source_index).clone();
        self.values
            .extend(std::iter::repeat(Some(source)).take(count));
    }

    /// Drops the last `count` slots.
    pub fn reduce(&mut self, count: usize) {
        let size = self.values.len();
        assert!(
            count <= size,
            "Cannot drop {count} variant slots out of {size}"
        );
        self.values.truncate(size - count);
    }

    /// Vacates the slot at `index`.  The slot stays allocated so that other
    /// variants keep their indexes.
    pub fn delete(&mut self, index: usize) {
        let size = self.values.len();
        match self.values.get_mut(index) {
            Some(slot) => *slot = None,
            None => panic!("Variant index {index} out of range (size: {size})"),
        }
    }

    /// Re-initializes the slots at `indexes` with a copy of the value at
    /// `source_index`.
    pub fn allocate(&mut self, indexes: &[usize], source_index: usize) {
        let source = self.get(source_index).clone();
        let size = self.values.len();
        for &index in indexes {
            match self.values.get_mut(index) {
                Some(slot) => *slot = Some(source.clone()),
                None => panic!("Variant index {index} out of range (size: {size})"),
            }
        }
    }
}

impl<T: Clone> MultiVariantObject for VariantArray<T> {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        match op {
            VariantOp::Extend {
                init_size,
                count,
                source_index,
            } => self.extend(*init_size, *count, *source_index),
            VariantOp::Reduce { count } => self.reduce(*count),
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
