// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Bookkeeping of variant ids and slot indexes.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::{VariantContext, VariantOp};
use crate::Error;

/// Id of the variant every network starts with.
pub const INITIAL_VARIANT_ID: &str = "InitialState";

/// What a clone did to one target variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CloneOutcome {
    Created { target: String },
    Overwritten { target: String },
}

/// Tracks the live variants of a network and the slot index assigned to
/// each of them.
///
/// The manager never touches the per-variant storage itself.  Every change
/// of the slot layout is returned as a list of [`VariantOp`]s, which the
/// network applies to all its multi-variant objects in the same call.
pub struct VariantManager {
    id_to_index: IndexMap<String, usize>,
    unused_indexes: BTreeSet<usize>,
    variant_array_size: usize,
    context: VariantContext,
}

impl VariantManager {
    pub(crate) fn new(multi_thread_access: bool) -> Self {
        let mut id_to_index = IndexMap::new();
        id_to_index.insert(INITIAL_VARIANT_ID.to_string(), 0);
        let context = if multi_thread_access {
            VariantContext::thread_local(Some(0))
        } else {
            VariantContext::shared(Some(0))
        };
        Self {
            id_to_index,
            unused_indexes: BTreeSet::new(),
            variant_array_size: 1,
            context,
        }
    }

    /// Returns the number of allocated variant slots, including the ones
    /// freed by removed variants that have not been reused yet.
    pub fn variant_array_size(&self) -> usize {
        self.variant_array_size
    }

    /// Returns the ids of the live variants, in creation order.
    pub fn variant_ids(&self) -> impl Iterator<Item = &str> {
        self.id_to_index.keys().map(String::as_str)
    }

    /// Returns the slot indexes of the live variants, sorted.
    pub fn variant_indexes(&self) -> Vec<usize> {
        let mut indexes = self.id_to_index.values().copied().collect::<Vec<_>>();
        indexes.sort_unstable();
        indexes
    }

    /// Returns the slot index of the given variant.
    pub fn variant_index(&self, variant_id: &str) -> Result<usize, Error> {
        self.id_to_index
            .get(variant_id)
            .copied()
            .ok_or_else(|| Error::invalid_variant(format!("Variant '{variant_id}' not found")))
    }

    /// Returns the id of the variant using the given slot, if any.
    pub fn variant_id(&self, index: usize) -> Option<&str> {
        self.id_to_index
            .iter()
            .find(|(_, &i)| i == index)
            .map(|(id, _)| id.as_str())
    }

    /// Returns the slot index of the working variant of the caller.
    pub fn working_variant_index(&self) -> Result<usize, Error> {
        self.context
            .variant_index()
            .ok_or_else(|| Error::invalid_variant("Variant index not set"))
    }

    /// Returns the id of the working variant of the caller.
    pub fn working_variant_id(&self) -> Result<&str, Error> {
        let index = self.working_variant_index()?;
        self.variant_id(index).ok_or_else(|| {
            Error::internal(format!("No variant is using the working slot {index}"))
        })
    }

    /// Makes the given variant the working variant of the caller.
    pub fn set_working_variant(&self, variant_id: &str) -> Result<(), Error> {
        let index = self.variant_index(variant_id)?;
        self.context.set_variant_index(index);
        Ok(())
    }

    /// Returns whether each thread has its own working variant.
    pub fn is_variant_multi_thread_access_allowed(&self) -> bool {
        self.context.is_thread_local()
    }

    /// Switches between a working variant shared by every thread and one
    /// working variant per thread.  The working variant of the calling thread
    /// is carried over.
    pub fn allow_variant_multi_thread_access(&mut self, allow: bool) {
        if allow == self.context.is_thread_local() {
            return;
        }
        let current = self.context.variant_index();
        self.context = if allow {
            VariantContext::thread_local(current)
        } else {
            VariantContext::shared(current)
        };
    }

    /// Registers the clones of `source_id` under each of the `target_ids`.
    ///
    /// Nothing is changed if any of the arguments is invalid.
    pub(crate) fn plan_clone(
        &mut self,
        source_id: &str,
        target_ids: &[String],
        may_overwrite: bool,
    ) -> Result<(Vec<VariantOp>, Vec<CloneOutcome>), Error> {
        if target_ids.is_empty() {
            return Err(Error::invalid_variant("Empty target variant id list"));
        }
        let source_index = self.variant_index(source_id)?;
        let mut seen = BTreeSet::new();
        for target_id in target_ids {
            if target_id.is_empty() {
                return Err(Error::invalid_variant("Empty target variant id"));
            }
            if !seen.insert(target_id.as_str()) {
                return Err(Error::invalid_variant(format!(
                    "Target variant '{target_id}' listed more than once"
                )));
            }
            if !may_overwrite && self.id_to_index.contains_key(target_id) {
                return Err(Error::invalid_variant(format!(
                    "Target variant '{target_id}' already exists"
                )));
            }
        }

        let mut outcomes = Vec::with_capacity(target_ids.len());
        let mut recycled = Vec::new();
        let mut new_ids = Vec::new();
        for target_id in target_ids {
            if let Some(&index) = self.id_to_index.get(target_id) {
                recycled.push(index);
                outcomes.push(CloneOutcome::Overwritten {
                    target: target_id.clone(),
                });
            } else if let Some(index) = self.unused_indexes.pop_first() {
                recycled.push(index);
                self.id_to_index.insert(target_id.clone(), index);
                outcomes.push(CloneOutcome::Created {
                    target: target_id.clone(),
                });
            } else {
                new_ids.push(target_id.clone());
                outcomes.push(CloneOutcome::Created {
                    target: target_id.clone(),
                });
            }
        }

        let mut ops = Vec::new();
        if !recycled.is_empty() {
            ops.push(VariantOp::Allocate {
                indexes: recycled,
                source_index,
            });
        }
        if !new_ids.is_empty() {
            let init_size = self.variant_array_size;
            for (offset, id) in new_ids.into_iter().enumerate() {
                self.id_to_index.insert(id, init_size + offset);
            }
            let count = self.id_to_index.len() + self.unused_indexes.len() - init_size;
            self.variant_array_size = init_size + count;
            ops.push(VariantOp::Extend {
                init_size,
                count,
                source_index,
            });
        }
        Ok((ops, outcomes))
    }

    /// Unregisters the given variant, freeing its slot.
    pub(crate) fn plan_remove(&mut self, variant_id: &str) -> Result<Vec<VariantOp>, Error> {
        if variant_id == INITIAL_VARIANT_ID {
            return Err(Error::invalid_variant("Removing initial variant is forbidden"));
        }
        let index = self.variant_index(variant_id)?;
        self.id_to_index.shift_remove(variant_id);
        self.context.reset_if_variant_index_is(index);

        if index + 1 == self.variant_array_size {
            // Pop this slot and every unused one right below it.
            let mut count = 1;
            while index >= count && self.unused_indexes.remove(&(index - count)) {
                count += 1;
            }
            self.variant_array_size -= count;
            Ok(vec![VariantOp::Reduce { count }])
        } else {
            self.unused_indexes.insert(index);
            Ok(vec![VariantOp::Delete { index }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(manager: &VariantManager) -> BTreeSet<&str> {
        manager.variant_ids().collect()
    }

    #[test]
    fn test_initial_state() {
        let manager = VariantManager::new(false);
        assert_eq!(manager.variant_array_size(), 1);
        assert_eq!(ids(&manager), BTreeSet::from([INITIAL_VARIANT_ID]));
        assert_eq!(manager.working_variant_id(), Ok(INITIAL_VARIANT_ID));
        assert!(manager.set_working_variant("Unknown").is_err());
    }

    #[test]
    fn test_clone_remove_and_recycle() -> Result<(), Error> {
        let mut manager = VariantManager::new(false);

        let (ops, _) = manager.plan_clone(INITIAL_VARIANT_ID, &["v1".into()], false)?;
        assert_eq!(
            ops,
            vec![VariantOp::Extend {
                init_size: 1,
                count: 1,
                source_index: 0
            }]
        );
        let (ops, _) = manager.plan_clone("v1", &["v2".into()], false)?;
        assert_eq!(
            ops,
            vec![VariantOp::Extend {
                init_size: 2,
                count: 1,
                source_index: 1
            }]
        );
        assert_eq!(manager.variant_indexes(), vec![0, 1, 2]);

        // overwriting needs permission
        assert!(manager
            .plan_clone("v2", &[INITIAL_VARIANT_ID.into()], false)
            .is_err_and(|e| e
                == Error::invalid_variant("Target variant 'InitialState' already exists")));
        let (ops, outcomes) = manager.plan_clone("v2", &[INITIAL_VARIANT_ID.into()], true)?;
        assert_eq!(
            ops,
            vec![VariantOp::Allocate {
                indexes: vec![0],
                source_index: 2
            }]
        );
        assert_eq!(
            outcomes,
            vec![CloneOutcome::Overwritten {
                target: INITIAL_VARIANT_ID.into()
            }]
        );

        // removing a slot in the middle keeps the array size
        manager.set_working_variant("v1")?;
        assert_eq!(
            manager.plan_remove("v1")?,
            vec![VariantOp::Delete { index: 1 }],
        );
        assert!(manager
            .working_variant_id()
            .is_err_and(|e| e == Error::invalid_variant("Variant index not set")));
        assert_eq!(manager.variant_array_size(), 3);
        assert_eq!(manager.variant_indexes(), vec![0, 2]);

        // freed slots are reused first
        let (ops, _) = manager.plan_clone("v2", &["v3".into()], false)?;
        assert_eq!(
            ops,
            vec![VariantOp::Allocate {
                indexes: vec![1],
                source_index: 2
            }]
        );
        assert_eq!(manager.variant_index("v3"), Ok(1));

        // removing the tail pops every trailing unused slot at once
        assert_eq!(
            manager.plan_remove("v3")?,
            vec![VariantOp::Delete { index: 1 }],
        );
        assert_eq!(
            manager.plan_remove("v2")?,
            vec![VariantOp::Reduce { count: 2 }],
        );
        assert_eq!(manager.variant_array_size(), 1);
        assert_eq!(ids(&manager), BTreeSet::from([INITIAL_VARIANT_ID]));

        assert!(manager
            .plan_remove(INITIAL_VARIANT_ID)
            .is_err_and(|e| e == Error::invalid_variant("Removing initial variant is forbidden")));
        assert!(manager
            .plan_remove("v2")
            .is_err_and(|e| e == Error::invalid_variant("Variant 'v2' not found")));

        Ok(())
    }

    #[test]
    fn test_clone_many_targets() -> Result<(), Error> {
        let mut manager = VariantManager::new(false);
        let (ops, outcomes) = manager.plan_clone(
            INITIAL_VARIANT_ID,
            &["a".into(), "b".into(), "c".into()],
            false,
        )?;
        assert_eq!(
            ops,
            vec![VariantOp::Extend {
                init_size: 1,
                count: 3,
                source_index: 0
            }]
        );
        assert_eq!(outcomes.len(), 3);
        manager.plan_remove("a")?;
        let (ops, _) = manager.plan_clone("c", &["d".into(), "e".into()], false)?;
        assert_eq!(
            ops,
            vec![
                VariantOp::Allocate {
                    indexes: vec![1],
                    source_index: 3
                },
                VariantOp::Extend {
                    init_size: 4,
                    count: 1,
                    source_index: 3
                }
            ]
        );
        assert_eq!(manager.variant_array_size(), 5);
        Ok(())
    }

    #[test]
    fn test_multi_thread_access() -> Result<(), Error> {
        let mut manager = VariantManager::new(false);
        manager.plan_clone(INITIAL_VARIANT_ID, &["v1".into()], false)?;
        manager.set_working_variant("v1")?;
        manager.allow_variant_multi_thread_access(true);
        assert!(manager.is_variant_multi_thread_access_allowed());
        assert_eq!(manager.working_variant_id(), Ok("v1"));

        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(manager.working_variant_index().is_err());
                manager.set_working_variant(INITIAL_VARIANT_ID).unwrap();
                assert_eq!(manager.working_variant_id(), Ok(INITIAL_VARIANT_ID));
            });
        });
        assert_eq!(manager.working_variant_id(), Ok("v1"));
        Ok(())
    }
}
