// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Variant-indexed storage.
//!
//! Every variant-dependent attribute of the network is stored as one slot per
//! variant.  The [`VariantManager`] is the single authority deciding when the
//! slot count changes.  Each change is turned into a [`VariantOp`] that is
//! applied to every [`MultiVariantObject`] of the network before the call
//! that caused it returns.

mod array;
mod context;
mod manager;
mod state_array;

pub use array::VariantArray;
pub(crate) use context::VariantContext;
pub(crate) use manager::CloneOutcome;
pub use manager::{VariantManager, INITIAL_VARIANT_ID};
pub(crate) use state_array::{StateArray, VariantState};

/// A resize of the per-variant storage, as decided by the
/// [`VariantManager`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariantOp {
    /// Append `count` slots after the `init_size` existing ones, each one
    /// copied from `source_index`.
    Extend {
        init_size: usize,
        count: usize,
        source_index: usize,
    },
    /// Drop the last `count` slots.
    Reduce { count: usize },
    /// Vacate the slot at `index` without renumbering the others.
    Delete { index: usize },
    /// Re-initialize the slots at `indexes` from `source_index`.
    Allocate {
        indexes: Vec<usize>,
        source_index: usize,
    },
}

/**
This trait is implemented by every object holding variant-dependent state.

The network fans out each [`VariantOp`] to all its multi-variant objects
without knowing their concrete types.  Objects only need to implement
[`apply_variant_op`][MultiVariantObject::apply_variant_op], typically by
forwarding the operation to each of their [`VariantArray`]s.

<details>
<summary>Example implementation for an extension storing one value per
variant:</summary>

```ignore
struct LoadForecast {
    values: VariantArray<f64>,
}

impl MultiVariantObject for LoadForecast {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.values.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.values.variant_array_size()
    }
}
```

</details>
*/
pub trait MultiVariantObject {
    /// Applies the given resize to all the variant-dependent state of the
    /// object.
    fn apply_variant_op(&mut self, op: &VariantOp);

    /// Returns the number of slots of the object's variant arrays, or `None`
    /// if the object holds no variant-dependent state.
    fn variant_array_size(&self) -> Option<usize>;

    /// Appends `count` slots, each copied from `source_index`.
    fn extend_variant_array_size(&mut self, init_size: usize, count: usize, source_index: usize) {
        self.apply_variant_op(&VariantOp::Extend {
            init_size,
            count,
            source_index,
        });
    }

    /// Drops the last `count` slots.
    fn reduce_variant_array_size(&mut self, count: usize) {
        self.apply_variant_op(&VariantOp::Reduce { count });
    }

    /// Vacates the slot at `index`.
    fn delete_variant_array_element(&mut self, index: usize) {
        self.apply_variant_op(&VariantOp::Delete { index });
    }

    /// Re-initializes the slots at `indexes` from `source_index`.
    fn allocate_variant_array_element(&mut self, indexes: &[usize], source_index: usize) {
        self.apply_variant_op(&VariantOp::Allocate {
            indexes: indexes.to_vec(),
            source_index,
        });
    }
}
