// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The topology of a voltage level: its switch graph, and the buses derived
//! from it.
//!
//! Every operation that changes a switch graph returns a [`GraphChange`],
//! which the caller must hand back to the network so that the cached views
//! of the affected variants are dropped.

mod bus_breaker;
mod node_breaker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

pub(crate) use bus_breaker::BusBreakerTopology;
pub(crate) use node_breaker::{NodeBreakerEdge, NodeBreakerTopology};

use crate::{
    arena::Arena,
    equipment::{Connectable, Switch, Terminal, TerminalKind},
    identifiable::{unique_id, ConnectableId, TerminalId, VoltageLevelId},
    index::ObjectIndex,
    variant::{MultiVariantObject, StateArray, VariantOp, VariantState},
    Error, Identifiable, IdentifiableType,
};

/// How the equipment of a voltage level is wired.  Chosen when the voltage
/// level is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    /// Numbered nodes joined by switches.  Buses are derived.
    #[default]
    NodeBreaker,
    /// Declared buses joined by switches.
    BusBreaker,
}

impl std::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyKind::NodeBreaker => write!(f, "node/breaker"),
            TopologyKind::BusBreaker => write!(f, "bus/breaker"),
        }
    }
}

/// The variants whose derived views a graph mutation made stale.
#[must_use = "cached views must be invalidated after a graph change"]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GraphChange {
    Unchanged,
    Variant(usize),
    AllVariants,
}

impl GraphChange {
    pub(crate) fn merge(self, other: GraphChange) -> GraphChange {
        match (self, other) {
            (GraphChange::Unchanged, change) | (change, GraphChange::Unchanged) => change,
            (GraphChange::Variant(a), GraphChange::Variant(b)) if a == b => GraphChange::Variant(a),
            _ => GraphChange::AllVariants,
        }
    }

    pub(crate) fn is_changed(self) -> bool {
        self != GraphChange::Unchanged
    }
}

/// Selects the switches an operation may open or close.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwitchPredicate {
    Any,
    Breaker,
    NonFictitious,
    /// The default for connections.
    #[default]
    NonFictitiousBreaker,
    /// The default for disconnections.
    ClosedBreaker,
    Open,
    Closed,
}

impl SwitchPredicate {
    pub fn test(self, switch: &Switch, variant: usize) -> bool {
        match self {
            SwitchPredicate::Any => true,
            SwitchPredicate::Breaker => switch.is_breaker(),
            SwitchPredicate::NonFictitious => !switch.is_fictitious(),
            SwitchPredicate::NonFictitiousBreaker => {
                switch.is_breaker() && !switch.is_fictitious()
            }
            SwitchPredicate::ClosedBreaker => switch.is_breaker() && !switch.is_open(variant),
            SwitchPredicate::Open => switch.is_open(variant),
            SwitchPredicate::Closed => !switch.is_open(variant),
        }
    }
}

/// What a calculated bus is made of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusMembers {
    /// Nodes of a node-breaker voltage level, sorted.
    Nodes(Vec<usize>),
    /// Configured buses of a bus-breaker voltage level.
    Buses(Vec<String>),
}

/// A bus of a bus view or a bus-breaker view.
///
/// Buses are snapshots: they are rebuilt from the switch graph after any
/// change to it, and are never updated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Bus {
    id: String,
    voltage_level: VoltageLevelId,
    members: BusMembers,
    terminals: Vec<TerminalId>,
}

impl Bus {
    pub(crate) fn new(
        id: String,
        voltage_level: VoltageLevelId,
        members: BusMembers,
        terminals: Vec<TerminalId>,
    ) -> Self {
        Self {
            id,
            voltage_level,
            members,
            terminals,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn voltage_level(&self) -> VoltageLevelId {
        self.voltage_level
    }

    pub fn members(&self) -> &BusMembers {
        &self.members
    }

    /// Returns the terminals connected to the bus.
    pub fn terminals(&self) -> &[TerminalId] {
        &self.terminals
    }
}

/// The buses of one view of one variant, with lookups from nodes and
/// configured buses.
#[derive(Debug, Default)]
pub(crate) struct BusCache {
    buses: Vec<Arc<Bus>>,
    by_node: HashMap<usize, usize>,
    by_configured_bus: HashMap<String, usize>,
}

impl BusCache {
    pub(crate) fn new(buses: Vec<Bus>) -> Self {
        let mut by_node = HashMap::new();
        let mut by_configured_bus = HashMap::new();
        for (position, bus) in buses.iter().enumerate() {
            match &bus.members {
                BusMembers::Nodes(nodes) => {
                    by_node.extend(nodes.iter().map(|node| (*node, position)));
                }
                BusMembers::Buses(ids) => {
                    by_configured_bus.extend(ids.iter().map(|id| (id.clone(), position)));
                }
            }
        }
        Self {
            buses: buses.into_iter().map(Arc::new).collect(),
            by_node,
            by_configured_bus,
        }
    }

    pub(crate) fn buses(&self) -> &[Arc<Bus>] {
        &self.buses
    }

    pub(crate) fn bus(&self, id: &str) -> Option<&Arc<Bus>> {
        self.buses.iter().find(|bus| bus.id == id)
    }

    pub(crate) fn bus_of_node(&self, node: usize) -> Option<&Arc<Bus>> {
        self.by_node
            .get(&node)
            .map(|&position| &self.buses[position])
    }

    pub(crate) fn bus_of_configured_bus(&self, id: &str) -> Option<&Arc<Bus>> {
        self.by_configured_bus
            .get(id)
            .map(|&position| &self.buses[position])
    }
}

/// The views of one variant, built on first use.
#[derive(Default)]
pub(crate) struct TopologyVariant {
    bus_view: Mutex<Option<Arc<BusCache>>>,
    bus_breaker_view: Mutex<Option<Arc<BusCache>>>,
}

impl TopologyVariant {
    fn get_or_build(
        cell: &Mutex<Option<Arc<BusCache>>>,
        build: impl FnOnce() -> BusCache,
    ) -> Arc<BusCache> {
        let mut cache = cell.lock();
        cache.get_or_insert_with(|| Arc::new(build())).clone()
    }

    fn invalidate(&self) {
        *self.bus_view.lock() = None;
        *self.bus_breaker_view.lock() = None;
    }
}

impl VariantState for TopologyVariant {
    fn copy(&self) -> Self {
        Self::default()
    }
}

/// Which calculated view to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ViewKind {
    BusBreaker,
    Bus,
}

/// Read access to the rest of the network, for building views.
pub(crate) struct TopologyContext<'a> {
    pub(crate) connectables: &'a Arena<ConnectableId, Connectable>,
    pub(crate) index: &'a ObjectIndex,
}

impl TopologyContext<'_> {
    pub(crate) fn terminal(&self, id: TerminalId) -> Option<&Terminal> {
        self.connectables
            .get(id.connectable())
            .and_then(|c| c.terminal_at(id.position()))
    }

    pub(crate) fn connectable_type(&self, id: TerminalId) -> Option<IdentifiableType> {
        self.connectables
            .get(id.connectable())
            .map(|c| c.identifiable_type())
    }

    /// Returns an id derived from `base` that no registered object and no
    /// bus in `taken` uses.
    pub(crate) fn unique_bus_id(&self, base: String, taken: &HashSet<String>) -> String {
        unique_id(base, |id| self.index.contains(id) || taken.contains(id))
    }
}

/// Counts of the equipment types at a set of terminals.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct FeederCounts {
    pub(crate) busbar_sections: usize,
    pub(crate) branches: usize,
    pub(crate) feeders: usize,
}

impl FeederCounts {
    pub(crate) fn count<'a>(
        terminals: impl IntoIterator<Item = &'a TerminalId>,
        context: &TopologyContext<'_>,
    ) -> Self {
        use crate::identifiable::TypePredicates;

        let mut counts = FeederCounts::default();
        for terminal in terminals {
            let Some(connectable) = context.connectables.get(terminal.connectable()) else {
                continue;
            };
            if connectable.is_busbar_section() {
                counts.busbar_sections += 1;
            }
            if connectable.is_feeder() {
                counts.feeders += 1;
            }
            if connectable.is_branch() {
                counts.branches += 1;
            }
        }
        counts
    }
}

pub(crate) enum TopologyModel {
    NodeBreaker(NodeBreakerTopology),
    BusBreaker(BusBreakerTopology),
}

impl TopologyModel {
    pub(crate) fn kind(&self) -> TopologyKind {
        match self {
            TopologyModel::NodeBreaker(_) => TopologyKind::NodeBreaker,
            TopologyModel::BusBreaker(_) => TopologyKind::BusBreaker,
        }
    }

    pub(crate) fn as_node_breaker(&self) -> Option<&NodeBreakerTopology> {
        match self {
            TopologyModel::NodeBreaker(topology) => Some(topology),
            TopologyModel::BusBreaker(_) => None,
        }
    }

    pub(crate) fn as_node_breaker_mut(&mut self) -> Option<&mut NodeBreakerTopology> {
        match self {
            TopologyModel::NodeBreaker(topology) => Some(topology),
            TopologyModel::BusBreaker(_) => None,
        }
    }

    pub(crate) fn as_bus_breaker(&self) -> Option<&BusBreakerTopology> {
        match self {
            TopologyModel::NodeBreaker(_) => None,
            TopologyModel::BusBreaker(topology) => Some(topology),
        }
    }

    pub(crate) fn as_bus_breaker_mut(&mut self) -> Option<&mut BusBreakerTopology> {
        match self {
            TopologyModel::NodeBreaker(_) => None,
            TopologyModel::BusBreaker(topology) => Some(topology),
        }
    }

    fn caches(&self) -> &StateArray<TopologyVariant> {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.caches(),
            TopologyModel::BusBreaker(topology) => topology.caches(),
        }
    }

    /// Returns the view of the given variant, building it if needed.
    pub(crate) fn view(
        &self,
        view: ViewKind,
        variant: usize,
        context: &TopologyContext<'_>,
    ) -> Arc<BusCache> {
        let state = self.caches().get(variant);
        let cell = match view {
            ViewKind::Bus => &state.bus_view,
            ViewKind::BusBreaker => &state.bus_breaker_view,
        };
        TopologyVariant::get_or_build(cell, || {
            tracing::trace!("Building {view:?} view of variant {variant}");
            match self {
                TopologyModel::NodeBreaker(topology) => {
                    topology.compute_buses(view, variant, context)
                }
                TopologyModel::BusBreaker(topology) => {
                    topology.compute_buses(view, variant, context)
                }
            }
        })
    }

    /// Returns the bus the terminal is connected to in the given view, if
    /// any.
    pub(crate) fn terminal_bus(
        &self,
        terminal: &Terminal,
        view: ViewKind,
        variant: usize,
        context: &TopologyContext<'_>,
    ) -> Option<Arc<Bus>> {
        match terminal.kind() {
            TerminalKind::Node { node } => self
                .view(view, variant, context)
                .bus_of_node(*node)
                .cloned(),
            TerminalKind::Bus {
                connectable_bus,
                connected,
            } => {
                if !*connected.get(variant) {
                    return None;
                }
                self.view(view, variant, context)
                    .bus_of_configured_bus(connectable_bus.get(variant))
                    .cloned()
            }
        }
    }

    /// Drops the cached views of the variants made stale by `change`.
    pub(crate) fn invalidate_cache(&self, change: GraphChange) {
        match change {
            GraphChange::Unchanged => {}
            GraphChange::Variant(variant) => self.caches().get(variant).invalidate(),
            GraphChange::AllVariants => self
                .caches()
                .iter()
                .for_each(TopologyVariant::invalidate),
        }
    }

    pub(crate) fn switch(&self, id: &str) -> Option<&Switch> {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.switch(id),
            TopologyModel::BusBreaker(topology) => topology.switch(id),
        }
    }

    pub(crate) fn switches(&self) -> Vec<&Switch> {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.switches().collect(),
            TopologyModel::BusBreaker(topology) => topology.switches().collect(),
        }
    }

    pub(crate) fn set_switch_open(
        &mut self,
        id: &str,
        variant: usize,
        open: bool,
    ) -> Result<(bool, GraphChange), Error> {
        let switch = match self {
            TopologyModel::NodeBreaker(topology) => topology.switch_mut(id),
            TopologyModel::BusBreaker(topology) => topology.switch_mut(id),
        }
        .ok_or_else(|| Error::element_not_found(format!("Switch '{id}' not found")))?;
        let old = switch.set_open(variant, open);
        let change = if old != open {
            GraphChange::Variant(variant)
        } else {
            GraphChange::Unchanged
        };
        Ok((old, change))
    }

    pub(crate) fn set_switch_retained(
        &mut self,
        id: &str,
        variant: usize,
        retained: bool,
    ) -> Result<(bool, GraphChange), Error> {
        let switch = match self {
            TopologyModel::NodeBreaker(topology) => topology.switch_mut(id),
            TopologyModel::BusBreaker(_) => {
                return Err(Error::invalid_topology(format!(
                    "Switch '{id}': retained status is not supported in a bus/breaker topology"
                )))
            }
        }
        .ok_or_else(|| Error::element_not_found(format!("Switch '{id}' not found")))?;
        let old = switch.set_retained(variant, retained);
        let change = if old != retained {
            GraphChange::Variant(variant)
        } else {
            GraphChange::Unchanged
        };
        Ok((old, change))
    }

    pub(crate) fn remove_switch(&mut self, id: &str) -> Result<(Switch, GraphChange), Error> {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.remove_switch(id),
            TopologyModel::BusBreaker(topology) => topology.remove_switch(id),
        }
    }
}

impl MultiVariantObject for TopologyModel {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.apply_variant_op(op),
            TopologyModel::BusBreaker(topology) => topology.apply_variant_op(op),
        }
    }

    fn variant_array_size(&self) -> Option<usize> {
        match self {
            TopologyModel::NodeBreaker(topology) => topology.variant_array_size(),
            TopologyModel::BusBreaker(topology) => topology.variant_array_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_graph_changes() {
        use GraphChange::*;
        assert_eq!(Unchanged.merge(Unchanged), Unchanged);
        assert_eq!(Unchanged.merge(Variant(1)), Variant(1));
        assert_eq!(Variant(1).merge(Variant(1)), Variant(1));
        assert_eq!(Variant(1).merge(Variant(2)), AllVariants);
        assert_eq!(AllVariants.merge(Unchanged), AllVariants);
        assert!(!Unchanged.is_changed());
    }

    #[test]
    fn test_switch_predicates() {
        let breaker = Switch::new(
            "BR".into(),
            None,
            crate::arena::ArenaKey::from_index(0),
            crate::SwitchKind::Breaker,
            false,
            true,
            false,
            1,
        );
        let fictitious_breaker = Switch::new(
            "FB".into(),
            None,
            crate::arena::ArenaKey::from_index(0),
            crate::SwitchKind::Breaker,
            true,
            false,
            false,
            1,
        );
        let disconnector = Switch::new(
            "D".into(),
            None,
            crate::arena::ArenaKey::from_index(0),
            crate::SwitchKind::Disconnector,
            false,
            false,
            false,
            1,
        );

        let non_fictitious = SwitchPredicate::NonFictitiousBreaker;
        assert!(non_fictitious.test(&breaker, 0));
        assert!(!non_fictitious.test(&fictitious_breaker, 0));
        assert!(!non_fictitious.test(&disconnector, 0));
        assert!(!SwitchPredicate::ClosedBreaker.test(&breaker, 0));
        assert!(SwitchPredicate::ClosedBreaker.test(&fictitious_breaker, 0));
        assert!(SwitchPredicate::Open.test(&breaker, 0));
        assert!(SwitchPredicate::Closed.test(&disconnector, 0));
        assert!(SwitchPredicate::NonFictitious.test(&disconnector, 0));
        assert!(SwitchPredicate::Any.test(&fictitious_breaker, 0));
    }
}
