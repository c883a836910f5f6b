// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The network: owner of all the equipment, their topology and their
//! variants.

mod attributes;
mod components;
mod connect_disconnect;
mod creation;
mod removal;
mod retrieval;
mod traversal;
mod variants;
mod views;

#[cfg(test)]
mod test_utils;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

pub use components::{Component, ComponentKind};
pub use connect_disconnect::StagedTopologyChange;
pub use traversal::{TopologyTraverser, TraverseResult};
pub use variants::VariantExtension;
pub use views::{BusBreakerView, BusView, NodeBreakerView};

use crate::{
    arena::Arena,
    config::NetworkConfig,
    equipment::{Connectable, HvdcLine, Substation, Terminal, VoltageLevel},
    identifiable::{ConnectableId, HvdcLineId, SubstationId, TerminalId, VoltageLevelId},
    index::ObjectIndex,
    listener::{AttributeValue, Listeners},
    topology::{GraphChange, TopologyContext},
    variant::{StateArray, VariantManager},
    Error,
};

use components::ComponentsVariant;

/**
An electrical network, with all its variants.

Equipment is added through the `add_*` methods, each taking a plain spec
that is validated in full before anything changes.  Variant-dependent
attributes are read from the objects returned by the retrieval methods,
passing the index of the variant to read, and written through the `set_*`
methods of the network, which act on the working variant.

The network keeps the calculated buses of each voltage level and the
connected components of the whole network in per-variant caches.  They are
built on first use, and dropped whenever the switch graph or the
attachments of a variant change.
*/
pub struct Network {
    id: String,
    config: NetworkConfig,
    variants: VariantManager,
    index: ObjectIndex,
    substations: Arena<SubstationId, Substation>,
    voltage_levels: Arena<VoltageLevelId, VoltageLevel>,
    connectables: Arena<ConnectableId, Connectable>,
    hvdc_lines: Arena<HvdcLineId, HvdcLine>,
    components: StateArray<ComponentsVariant>,
    extensions: IndexMap<String, Box<dyn VariantExtension>>,
    listeners: Listeners,
    properties: HashMap<String, IndexMap<String, String>>,
    invalidations: AtomicU64,
}

impl Network {
    fn context(&self) -> TopologyContext<'_> {
        TopologyContext {
            connectables: &self.connectables,
            index: &self.index,
        }
    }

    fn working_variant(&self) -> Result<usize, Error> {
        self.variants.working_variant_index()
    }

    /// Drops the cached views made stale by a change of the topology of a
    /// voltage level, and the connected components of the same variants.
    fn propagate(&self, voltage_level: VoltageLevelId, change: GraphChange) {
        if !change.is_changed() {
            return;
        }
        if let Some(vl) = self.voltage_levels.get(voltage_level) {
            vl.topology.invalidate_cache(change);
        }
        self.invalidate_components(change);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops the connected components of every variant, after a change to
    /// equipment joining voltage levels.
    fn invalidate_all_components(&self) {
        self.invalidate_components(GraphChange::AllVariants);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns how many times cached views were invalidated since the network
    /// was created.
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    fn terminal_mut(&mut self, id: TerminalId) -> Result<&mut Terminal, Error> {
        self.connectables
            .get_mut(id.connectable())
            .and_then(|c| c.terminal_at_mut(id.position()))
            .ok_or_else(|| Error::element_not_found(format!("Terminal {id:?} not found")))
    }

    fn notify_update(
        &self,
        id: &str,
        attribute: &str,
        variant: Option<usize>,
        old_value: AttributeValue,
        new_value: AttributeValue,
    ) {
        if self.listeners.is_empty() || old_value.is_same(&new_value) {
            return;
        }
        let variant_id = variant.and_then(|v| self.variants.variant_id(v));
        self.listeners.notify("update", |l| {
            l.on_update(id, attribute, variant_id, &old_value, &new_value)
        });
    }
}
