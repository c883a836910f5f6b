// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Bus-breaker topologies: configured buses joined by switches.

use std::collections::HashSet;

use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

use super::{
    Bus, BusCache, BusMembers, FeederCounts, GraphChange, TopologyContext, TopologyVariant,
    ViewKind,
};
use crate::{
    equipment::{ConfiguredBus, Switch},
    identifiable::{TerminalId, VoltageLevelId},
    variant::{MultiVariantObject, StateArray, VariantOp},
    Error, Identifiable,
};

pub(crate) struct BusBreakerTopology {
    voltage_level: VoltageLevelId,
    voltage_level_id: String,
    graph: StableUnGraph<ConfiguredBus, Switch>,
    buses: IndexMap<String, NodeIndex>,
    switches: IndexMap<String, EdgeIndex>,
    caches: StateArray<TopologyVariant>,
}

impl BusBreakerTopology {
    pub(crate) fn new(
        voltage_level: VoltageLevelId,
        voltage_level_id: String,
        variant_array_size: usize,
    ) -> Self {
        Self {
            voltage_level,
            voltage_level_id,
            graph: StableUnGraph::default(),
            buses: IndexMap::new(),
            switches: IndexMap::new(),
            caches: StateArray::new(variant_array_size, TopologyVariant::default),
        }
    }

    pub(crate) fn caches(&self) -> &StateArray<TopologyVariant> {
        &self.caches
    }

    fn bus_index(&self, owner: &str, id: &str) -> Result<NodeIndex, Error> {
        self.buses.get(id).copied().ok_or_else(|| {
            Error::validation(format!(
                "{owner}: bus '{id}' not found in voltage level '{}'",
                self.voltage_level_id
            ))
        })
    }

    pub(crate) fn add_bus(&mut self, bus: ConfiguredBus) -> GraphChange {
        let id = bus.id().to_string();
        let index = self.graph.add_node(bus);
        self.buses.insert(id, index);
        GraphChange::AllVariants
    }

    pub(crate) fn bus(&self, id: &str) -> Option<&ConfiguredBus> {
        self.buses.get(id).map(|index| &self.graph[*index])
    }

    pub(crate) fn bus_mut(&mut self, id: &str) -> Option<&mut ConfiguredBus> {
        let index = *self.buses.get(id)?;
        self.graph.node_weight_mut(index)
    }

    /// Returns the configured buses, in insertion order.
    pub(crate) fn buses(&self) -> impl Iterator<Item = &ConfiguredBus> {
        self.buses.values().map(|index| &self.graph[*index])
    }

    /// Checks that a bus could be removed: it must have no terminal and no
    /// switch left.
    pub(crate) fn check_bus_removal(&self, id: &str) -> Result<NodeIndex, Error> {
        let index = *self
            .buses
            .get(id)
            .ok_or_else(|| Error::element_not_found(format!("Bus '{id}' not found")))?;
        if self.graph[index].has_terminals() {
            return Err(Error::validation(format!(
                "Cannot remove bus '{id}' due to connected equipments"
            )));
        }
        if let Some(edge) = self.graph.edges(index).next() {
            return Err(Error::validation(format!(
                "Cannot remove bus '{id}' due to the connected switch '{}'",
                edge.weight().id()
            )));
        }
        Ok(index)
    }

    pub(crate) fn remove_bus(&mut self, id: &str) -> Result<(ConfiguredBus, GraphChange), Error> {
        let index = self.check_bus_removal(id)?;
        self.buses.shift_remove(id);
        let bus = self
            .graph
            .remove_node(index)
            .ok_or_else(|| Error::internal(format!("Bus '{id}' missing from its graph")))?;
        Ok((bus, GraphChange::AllVariants))
    }

    pub(crate) fn check_switch(
        &self,
        switch_id: &str,
        bus1: &str,
        bus2: &str,
    ) -> Result<(), Error> {
        let owner = format!("Switch '{switch_id}'");
        self.bus_index(&owner, bus1)?;
        self.bus_index(&owner, bus2)?;
        if bus1 == bus2 {
            return Err(Error::validation(format!(
                "{owner}: both ends are on bus '{bus1}'"
            )));
        }
        Ok(())
    }

    pub(crate) fn add_switch(
        &mut self,
        switch: Switch,
        bus1: &str,
        bus2: &str,
    ) -> Result<GraphChange, Error> {
        self.check_switch(switch.id(), bus1, bus2)?;
        let owner = format!("Switch '{}'", switch.id());
        let a = self.bus_index(&owner, bus1)?;
        let b = self.bus_index(&owner, bus2)?;
        let id = switch.id().to_string();
        let edge = self.graph.add_edge(a, b, switch);
        self.switches.insert(id, edge);
        Ok(GraphChange::AllVariants)
    }

    pub(crate) fn switch(&self, id: &str) -> Option<&Switch> {
        self.switches
            .get(id)
            .and_then(|edge| self.graph.edge_weight(*edge))
    }

    pub(crate) fn switch_mut(&mut self, id: &str) -> Option<&mut Switch> {
        let edge = *self.switches.get(id)?;
        self.graph.edge_weight_mut(edge)
    }

    pub(crate) fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.switches
            .values()
            .filter_map(|edge| self.graph.edge_weight(*edge))
    }

    pub(crate) fn switch_buses(&self, id: &str) -> Option<(&str, &str)> {
        let edge = self.switches.get(id)?;
        let (a, b) = self.graph.edge_endpoints(*edge)?;
        Some((self.graph[a].id(), self.graph[b].id()))
    }

    pub(crate) fn remove_switch(&mut self, id: &str) -> Result<(Switch, GraphChange), Error> {
        let edge = self
            .switches
            .shift_remove(id)
            .ok_or_else(|| Error::element_not_found(format!("Switch '{id}' not found")))?;
        let switch = self.graph.remove_edge(edge).ok_or_else(|| {
            Error::internal(format!(
                "Switch '{id}' is not an edge of voltage level '{}'",
                self.voltage_level_id
            ))
        })?;
        Ok((switch, GraphChange::AllVariants))
    }

    /// Returns the switches at a bus, each with the bus at its other end.
    pub(crate) fn adjacent(&self, bus: &str) -> Vec<(&Switch, &str)> {
        let Some(&index) = self.buses.get(bus) else {
            return Vec::new();
        };
        self.graph
            .edges(index)
            .map(|edge| {
                let other = if edge.source() == index {
                    edge.target()
                } else {
                    edge.source()
                };
                (edge.weight(), self.graph[other].id())
            })
            .collect()
    }

    /// Checks that a terminal could be attached to `bus`.
    pub(crate) fn check_attach(&self, owner: &str, bus: &str) -> Result<(), Error> {
        self.bus_index(owner, bus).map(|_| ())
    }

    /// Maps the terminal to `bus` in every variant.
    pub(crate) fn attach(&mut self, terminal: TerminalId, bus: &str) -> Result<GraphChange, Error> {
        let index = self.bus_index(&format!("Terminal {terminal:?}"), bus)?;
        self.graph[index].add_terminal_everywhere(terminal);
        Ok(GraphChange::AllVariants)
    }

    /// Unmaps the terminal from the given buses, in every variant.
    pub(crate) fn detach(&mut self, terminal: TerminalId, buses: &[&str]) -> GraphChange {
        for bus in buses {
            if let Some(bus) = self.bus_mut(bus) {
                bus.remove_terminal_everywhere(terminal);
            }
        }
        GraphChange::AllVariants
    }

    /// Moves the terminal from one bus to another in a single variant.
    pub(crate) fn move_terminal(
        &mut self,
        terminal: TerminalId,
        variant: usize,
        from: &str,
        to: &str,
    ) -> Result<GraphChange, Error> {
        let owner = format!("Terminal {terminal:?}");
        let from_index = self.bus_index(&owner, from)?;
        let to_index = self.bus_index(&owner, to)?;
        if from_index == to_index {
            return Ok(GraphChange::Unchanged);
        }
        self.graph[from_index].remove_terminal(variant, terminal);
        self.graph[to_index].add_terminal(variant, terminal);
        Ok(GraphChange::Variant(variant))
    }

    /// Builds the buses of a view.
    ///
    /// The bus-breaker view is made of the configured buses themselves.  In
    /// the bus view, configured buses joined by closed switches merge, and a
    /// merged bus needs at least one connected feeder.
    pub(crate) fn compute_buses(
        &self,
        view: ViewKind,
        variant: usize,
        context: &TopologyContext<'_>,
    ) -> BusCache {
        let connected_terminals = |index: NodeIndex| {
            self.graph[index]
                .terminals(variant)
                .iter()
                .copied()
                .filter(|t| {
                    context
                        .terminal(*t)
                        .and_then(|terminal| terminal.bus_connected(variant))
                        .unwrap_or(false)
                })
                .collect::<Vec<_>>()
        };

        if view == ViewKind::BusBreaker {
            return BusCache::new(
                self.buses
                    .iter()
                    .map(|(id, index)| {
                        Bus::new(
                            id.clone(),
                            self.voltage_level,
                            BusMembers::Buses(vec![id.clone()]),
                            connected_terminals(*index),
                        )
                    })
                    .collect(),
            );
        }

        let mut visited = HashSet::new();
        let mut taken = HashSet::new();
        let mut buses = Vec::new();
        for &start in self.buses.values() {
            if !visited.insert(start) {
                continue;
            }
            let mut stack = vec![start];
            let mut members = Vec::new();
            while let Some(index) = stack.pop() {
                members.push(index);
                for edge in self.graph.edges(index) {
                    if edge.weight().is_open(variant) {
                        continue;
                    }
                    let other = if edge.source() == index {
                        edge.target()
                    } else {
                        edge.source()
                    };
                    if visited.insert(other) {
                        stack.push(other);
                    }
                }
            }
            // Keep the members in declaration order.
            members.sort_unstable_by_key(|index| self.buses.get_index_of(self.graph[*index].id()));
            let terminals = members
                .iter()
                .flat_map(|index| connected_terminals(*index))
                .collect::<Vec<_>>();
            if FeederCounts::count(&terminals, context).feeders < 1 {
                continue;
            }
            let id = context.unique_bus_id(
                format!("{}_{}", self.voltage_level_id, buses.len()),
                &taken,
            );
            taken.insert(id.clone());
            buses.push(Bus::new(
                id,
                self.voltage_level,
                BusMembers::Buses(
                    members
                        .iter()
                        .map(|index| self.graph[*index].id().to_string())
                        .collect(),
                ),
                terminals,
            ));
        }
        tracing::trace!(
            "Voltage level '{}' has {} merged buses in variant {variant}",
            self.voltage_level_id,
            buses.len()
        );
        BusCache::new(buses)
    }
}

impl MultiVariantObject for BusBreakerTopology {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        for bus in self.graph.node_weights_mut() {
            bus.apply_variant_op(op);
        }
        for switch in self.graph.edge_weights_mut() {
            switch.apply_variant_op(op);
        }
        self.caches.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.caches.variant_array_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaKey};
    use crate::equipment::{Connectable, ConnectableKind, Load, SwitchKind, Terminal, TerminalKind};
    use crate::identifiable::ConnectableId;
    use crate::index::ObjectIndex;
    use crate::VariantArray;

    fn vl() -> VoltageLevelId {
        VoltageLevelId::from_index(0)
    }

    fn topology_with_buses(ids: &[&str]) -> BusBreakerTopology {
        let mut topology = BusBreakerTopology::new(vl(), "VL".into(), 1);
        for id in ids {
            let _ = topology.add_bus(ConfiguredBus::new(id.to_string(), None, vl(), 1));
        }
        topology
    }

    fn add_load(
        topology: &mut BusBreakerTopology,
        connectables: &mut Arena<ConnectableId, Connectable>,
        bus: &str,
        connected: bool,
    ) -> TerminalId {
        let terminal = TerminalId::new(connectables.next_key(), 0);
        connectables.insert(Connectable::new(
            format!("LOAD_{bus}"),
            None,
            vec![Terminal::new(
                terminal,
                vl(),
                None,
                TerminalKind::Bus {
                    connectable_bus: VariantArray::new(1, bus.to_string()),
                    connected: VariantArray::new(1, connected),
                },
                1,
            )],
            ConnectableKind::Load(Load {
                p0: VariantArray::new(1, 0.0),
                q0: VariantArray::new(1, 0.0),
            }),
        ));
        let _ = topology.attach(terminal, bus).unwrap();
        terminal
    }

    #[test]
    fn test_merged_buses() -> Result<(), Error> {
        let mut connectables = Arena::new();
        let index = ObjectIndex::new();
        let mut topology = topology_with_buses(&["A", "B", "C", "D"]);
        let a = add_load(&mut topology, &mut connectables, "A", true);
        let b = add_load(&mut topology, &mut connectables, "B", true);
        let c = add_load(&mut topology, &mut connectables, "C", true);
        add_load(&mut topology, &mut connectables, "D", false);
        let _ = topology.add_switch(
            Switch::new("AB".into(), None, vl(), SwitchKind::Breaker, false, false, false, 1),
            "A",
            "B",
        )?;
        let _ = topology.add_switch(
            Switch::new("BC".into(), None, vl(), SwitchKind::Breaker, false, true, false, 1),
            "B",
            "C",
        )?;

        let context = TopologyContext {
            connectables: &connectables,
            index: &index,
        };
        let merged = topology.compute_buses(ViewKind::Bus, 0, &context);
        // D has no connected feeder
        assert_eq!(merged.buses().len(), 2);
        let ab = merged.bus_of_configured_bus("A").unwrap();
        assert_eq!(ab.id(), "VL_0");
        assert_eq!(
            ab.members(),
            &BusMembers::Buses(vec!["A".into(), "B".into()])
        );
        assert_eq!(ab.terminals(), &[a, b]);
        assert_eq!(merged.bus_of_configured_bus("C").unwrap().terminals(), &[c]);
        assert!(merged.bus_of_configured_bus("D").is_none());

        let configured = topology.compute_buses(ViewKind::BusBreaker, 0, &context);
        assert_eq!(configured.buses().len(), 4);
        assert!(configured.bus("D").unwrap().terminals().is_empty());
        Ok(())
    }

    #[test]
    fn test_bus_removal() -> Result<(), Error> {
        let mut connectables = Arena::new();
        let mut topology = topology_with_buses(&["A", "B"]);
        let t = add_load(&mut topology, &mut connectables, "A", true);
        let _ = topology.add_switch(
            Switch::new("AB".into(), None, vl(), SwitchKind::Breaker, false, false, false, 1),
            "A",
            "B",
        )?;

        assert_eq!(
            topology.remove_bus("A").map(|_| ()),
            Err(Error::validation(
                "Cannot remove bus 'A' due to connected equipments"
            ))
        );
        assert_eq!(
            topology.remove_bus("B").map(|_| ()),
            Err(Error::validation(
                "Cannot remove bus 'B' due to the connected switch 'AB'"
            ))
        );

        let _ = topology.detach(t, &["A"]);
        let _ = topology.remove_switch("AB")?;
        let (bus, _) = topology.remove_bus("A")?;
        assert_eq!(bus.id(), "A");
        assert_eq!(topology.buses().count(), 1);
        assert_eq!(
            topology.check_attach("Load 'L'", "A"),
            Err(Error::validation(
                "Load 'L': bus 'A' not found in voltage level 'VL'"
            ))
        );
        Ok(())
    }

    #[test]
    fn test_move_terminal() -> Result<(), Error> {
        let mut connectables = Arena::new();
        let mut topology = topology_with_buses(&["A", "B"]);
        let t = add_load(&mut topology, &mut connectables, "A", true);
        assert_eq!(
            topology.move_terminal(t, 0, "A", "B")?,
            GraphChange::Variant(0)
        );
        assert!(topology.bus("A").unwrap().terminals(0).is_empty());
        assert_eq!(topology.bus("B").unwrap().terminals(0), &[t]);
        assert_eq!(
            topology.move_terminal(t, 0, "B", "B")?,
            GraphChange::Unchanged
        );
        Ok(())
    }
}
