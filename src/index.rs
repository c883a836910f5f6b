// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The index of all the identifiable objects of a network.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::{identifiable::ElementRef, Error, IdentifiableType};

#[derive(Clone, Debug, PartialEq)]
struct IndexEntry {
    kind: IdentifiableType,
    element: ElementRef,
}

/// Maps ids to the objects registered under them, and types to the ids of
/// the objects of exactly that type.
///
/// Ids are unique across the whole network, whatever the type of the object.
#[derive(Default)]
pub(crate) struct ObjectIndex {
    objects: IndexMap<String, IndexEntry>,
    by_type: HashMap<IdentifiableType, IndexSet<String>>,
}

impl ObjectIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Checks that `id` is a valid and unused id.
    pub(crate) fn check_id(&self, id: &str, kind: IdentifiableType) -> Result<(), Error> {
        if id.is_empty() {
            return Err(Error::validation(format!("{kind} id must not be empty")));
        }
        if let Some(existing) = self.objects.get(id) {
            return Err(Error::duplicate_id(format!(
                "The network already contains an object '{id}' of type {}",
                existing.kind
            )));
        }
        Ok(())
    }

    /// Registers an object, failing if its id is empty or already used.
    pub(crate) fn check_and_add(
        &mut self,
        id: &str,
        kind: IdentifiableType,
        element: ElementRef,
    ) -> Result<(), Error> {
        self.check_id(id, kind)?;
        self.objects
            .insert(id.to_string(), IndexEntry { kind, element });
        self.by_type.entry(kind).or_default().insert(id.to_string());
        Ok(())
    }

    /// Unregisters an object.
    ///
    /// Fails if no object is registered under `id`, or if the registered one
    /// is not the object at `element`.
    pub(crate) fn remove(&mut self, id: &str, element: &ElementRef) -> Result<(), Error> {
        match self.objects.get(id) {
            Some(entry) if &entry.element == element => {}
            Some(entry) => {
                return Err(Error::internal(format!(
                    "Object '{id}' is registered at {:?}, not at {element:?}",
                    entry.element
                )))
            }
            None => {
                return Err(Error::internal(format!(
                    "Object '{id}' is not registered in the network"
                )))
            }
        }
        if let Some(entry) = self.objects.shift_remove(id) {
            if let Some(bucket) = self.by_type.get_mut(&entry.kind) {
                bucket.shift_remove(id);
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ElementRef> {
        self.objects.get(id).map(|entry| &entry.element)
    }

    pub(crate) fn kind(&self, id: &str) -> Option<IdentifiableType> {
        self.objects.get(id).map(|entry| entry.kind)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Returns the ids of the objects of exactly the given type, in
    /// registration order.
    pub(crate) fn get_all(&self, kind: IdentifiableType) -> impl Iterator<Item = &str> {
        self.by_type
            .get(&kind)
            .into_iter()
            .flat_map(|bucket| bucket.iter().map(String::as_str))
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}
