// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The three views of the topology of a voltage level.

use std::sync::Arc;

use super::Network;
use crate::{
    equipment::{Switch, TerminalKind, VoltageLevel},
    identifiable::TerminalId,
    topology::{Bus, BusCache, NodeBreakerTopology, TopologyModel, ViewKind},
    Error, Identifiable,
};

/// The buses of a voltage level, merged across closed switches, in one
/// variant.
///
/// A view is a snapshot: it is not updated by later changes to the network.
pub struct BusView<'a> {
    voltage_level: &'a VoltageLevel,
    cache: Arc<BusCache>,
}

impl BusView<'_> {
    pub fn buses(&self) -> &[Arc<Bus>] {
        self.cache.buses()
    }

    pub fn bus(&self, id: &str) -> Option<&Arc<Bus>> {
        self.cache.bus(id)
    }

    /// Returns the merged bus a configured bus belongs to, in bus-breaker
    /// voltage levels.
    pub fn merged_bus(&self, configured_bus: &str) -> Option<&Arc<Bus>> {
        self.cache.bus_of_configured_bus(configured_bus)
    }

    /// Returns the bus a node belongs to, in node-breaker voltage levels.
    pub fn bus_of_node(&self, node: usize) -> Option<&Arc<Bus>> {
        self.cache.bus_of_node(node)
    }

    pub fn voltage_level(&self) -> &VoltageLevel {
        self.voltage_level
    }
}

/// The buses of a voltage level, split at open or retained switches, in one
/// variant.
///
/// In bus-breaker voltage levels the buses are the configured buses
/// themselves.
pub struct BusBreakerView<'a> {
    voltage_level: &'a VoltageLevel,
    cache: Arc<BusCache>,
    variant: usize,
}

impl BusBreakerView<'_> {
    pub fn buses(&self) -> &[Arc<Bus>] {
        self.cache.buses()
    }

    pub fn bus(&self, id: &str) -> Option<&Arc<Bus>> {
        self.cache.bus(id)
    }

    pub fn bus_of_node(&self, node: usize) -> Option<&Arc<Bus>> {
        self.cache.bus_of_node(node)
    }

    /// Returns the switches separating the buses of the view.
    ///
    /// In node-breaker voltage levels, closed switches that are not retained
    /// are inside a bus and are left out.
    pub fn switches(&self) -> Vec<&Switch> {
        match &self.voltage_level.topology {
            TopologyModel::BusBreaker(topology) => topology.switches().collect(),
            TopologyModel::NodeBreaker(topology) => topology
                .switches()
                .filter(|s| s.is_open(self.variant) || s.is_retained(self.variant))
                .collect(),
        }
    }

    /// Returns the ids of the buses at both ends of a switch of the view.
    pub fn switch_buses(&self, switch_id: &str) -> Option<(String, String)> {
        match &self.voltage_level.topology {
            TopologyModel::BusBreaker(topology) => topology
                .switch_buses(switch_id)
                .map(|(a, b)| (a.to_string(), b.to_string())),
            TopologyModel::NodeBreaker(topology) => {
                let (node1, node2) = topology.switch_nodes(switch_id)?;
                let bus1 = self.cache.bus_of_node(node1)?;
                let bus2 = self.cache.bus_of_node(node2)?;
                (bus1.id() != bus2.id()).then(|| (bus1.id().to_string(), bus2.id().to_string()))
            }
        }
    }
}

/// The switch graph of a node-breaker voltage level.
pub struct NodeBreakerView<'a> {
    topology: &'a NodeBreakerTopology,
}

impl NodeBreakerView<'_> {
    pub fn max_node_index(&self) -> usize {
        self.topology.max_node_index()
    }

    /// Returns the nodes in use, sorted.
    pub fn nodes(&self) -> Vec<usize> {
        self.topology.nodes()
    }

    /// Returns the terminal attached at a node, if any.
    pub fn terminal(&self, node: usize) -> Option<TerminalId> {
        self.topology.terminal_at(node)
    }

    pub fn switches(&self) -> Vec<&Switch> {
        self.topology.switches().collect()
    }

    pub fn switch_nodes(&self, switch_id: &str) -> Option<(usize, usize)> {
        self.topology.switch_nodes(switch_id)
    }

    pub fn internal_connections(&self) -> Vec<(usize, usize)> {
        self.topology.internal_connections()
    }

    /// Returns the nodes joined to `node` by a switch or an internal
    /// connection, each with the switch id if there is one.
    pub fn neighbors(&self, node: usize) -> Vec<(usize, Option<&str>)> {
        self.topology
            .adjacent(node)
            .into_iter()
            .map(|(edge, other)| {
                let switch = match edge {
                    crate::topology::NodeBreakerEdge::Switch(switch) => Some(switch.id()),
                    crate::topology::NodeBreakerEdge::InternalConnection => None,
                };
                (other, switch)
            })
            .collect()
    }
}

/// `Network` methods for reading the topology of voltage levels.
impl Network {
    /// Returns the bus view of a voltage level in the working variant.
    pub fn bus_view(&self, voltage_level: &str) -> Result<BusView<'_>, Error> {
        let variant = self.working_variant()?;
        let vl = self.voltage_level(voltage_level)?;
        Ok(BusView {
            voltage_level: vl,
            cache: vl.topology.view(ViewKind::Bus, variant, &self.context()),
        })
    }

    /// Returns the bus-breaker view of a voltage level in the working
    /// variant.
    pub fn bus_breaker_view(&self, voltage_level: &str) -> Result<BusBreakerView<'_>, Error> {
        let variant = self.working_variant()?;
        let vl = self.voltage_level(voltage_level)?;
        Ok(BusBreakerView {
            voltage_level: vl,
            cache: vl
                .topology
                .view(ViewKind::BusBreaker, variant, &self.context()),
            variant,
        })
    }

    /// Returns the node-breaker view of a voltage level.
    ///
    /// Only node-breaker voltage levels have one.
    pub fn node_breaker_view(&self, voltage_level: &str) -> Result<NodeBreakerView<'_>, Error> {
        let vl = self.voltage_level(voltage_level)?;
        let topology = vl.topology.as_node_breaker().ok_or_else(|| {
            Error::unsupported_view(format!(
                "Voltage level '{}' has no node/breaker view",
                vl.id()
            ))
        })?;
        Ok(NodeBreakerView { topology })
    }

    pub(super) fn bus_view_bus_of(
        &self,
        terminal: TerminalId,
        variant: usize,
    ) -> Result<Option<Arc<Bus>>, Error> {
        self.terminal_bus_in(terminal, ViewKind::Bus, variant)
    }

    fn terminal_bus_in(
        &self,
        terminal: TerminalId,
        view: ViewKind,
        variant: usize,
    ) -> Result<Option<Arc<Bus>>, Error> {
        let terminal = self.terminal(terminal)?;
        let vl = self.voltage_level_at(terminal.voltage_level())?;
        let context = self.context();
        Ok(vl.topology.terminal_bus(terminal, view, variant, &context))
    }

    /// Returns the bus of the bus view the terminal is connected to in the
    /// working variant, if any.
    pub fn terminal_bus(&self, terminal: TerminalId) -> Result<Option<Arc<Bus>>, Error> {
        self.terminal_bus_in(terminal, ViewKind::Bus, self.working_variant()?)
    }

    /// Returns the bus of the bus-breaker view the terminal is connected to
    /// in the working variant, if any.
    pub fn terminal_bus_breaker_bus(
        &self,
        terminal: TerminalId,
    ) -> Result<Option<Arc<Bus>>, Error> {
        self.terminal_bus_in(terminal, ViewKind::BusBreaker, self.working_variant()?)
    }

    /// Returns whether the terminal is connected in the working variant.
    ///
    /// Bus-breaker terminals are connected when their connection flag is
    /// set.  Node-breaker terminals are connected when they are on a bus of
    /// the bus view.
    pub fn is_connected(&self, terminal: TerminalId) -> Result<bool, Error> {
        self.is_connected_in(terminal, self.working_variant()?)
    }

    pub(super) fn is_connected_in(
        &self,
        terminal: TerminalId,
        variant: usize,
    ) -> Result<bool, Error> {
        let t = self.terminal(terminal)?;
        match t.kind() {
            TerminalKind::Bus { connected, .. } => Ok(*connected.get(variant)),
            TerminalKind::Node { .. } => Ok(self
                .terminal_bus_in(terminal, ViewKind::Bus, variant)?
                .is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        equipment::{SwitchSpec, TerminalSpec},
        network::test_utils::NetworkBuilder,
        topology::BusMembers,
        SwitchKind,
    };

    #[test]
    fn test_buses_merge_when_switch_closes() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .node_breaker_level("VL")
            .switch("VL", "S", SwitchKind::Breaker, (0, 1), true)
            .load("L1", TerminalSpec::at_node("VL", 0))
            .load("L2", TerminalSpec::at_node("VL", 1))
            .build();
        let l1 = network.connectable("L1")?.terminals()[0].id();
        let l2 = network.connectable("L2")?.terminals()[0].id();

        let ids = |network: &Network| {
            network
                .bus_view("VL")
                .unwrap()
                .buses()
                .iter()
                .map(|bus| bus.id().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&network), vec!["VL_0", "VL_1"]);
        assert!(network.is_connected(l1)?);

        let before = network.invalidation_count();
        network.set_switch_open("S", false)?;
        assert_eq!(network.invalidation_count(), before + 1);

        let view = network.bus_view("VL")?;
        assert_eq!(view.buses().len(), 1);
        let bus = &view.buses()[0];
        assert_eq!(bus.id(), "VL_0");
        assert_eq!(bus.members(), &BusMembers::Nodes(vec![0, 1]));
        assert_eq!(bus.terminals(), &[l1, l2]);
        assert_eq!(network.terminal_bus(l2)?.map(|b| b.id().to_string()), Some("VL_0".into()));
        Ok(())
    }

    #[test]
    fn test_bus_breaker_view_of_node_breaker_level() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .node_breaker_level("VL")
            .busbar_section("VL", "BBS", 0)
            .switch("VL", "D", SwitchKind::Disconnector, (0, 1), false)
            .switch("VL", "B", SwitchKind::Breaker, (1, 2), false)
            .load("L", TerminalSpec::at_node("VL", 2))
            .build();

        assert_eq!(network.bus_breaker_view("VL")?.buses().len(), 1);
        network.set_switch_retained("B", true)?;
        let view = network.bus_breaker_view("VL")?;
        assert_eq!(view.buses().len(), 2);
        assert_eq!(
            view.switches().iter().map(|s| s.id()).collect::<Vec<_>>(),
            vec!["B"]
        );
        assert_eq!(
            view.switch_buses("B"),
            Some(("VL_0".to_string(), "VL_2".to_string()))
        );
        // retained switches do not split the bus view
        assert_eq!(network.bus_view("VL")?.buses().len(), 1);

        let nb = network.node_breaker_view("VL")?;
        assert_eq!(nb.nodes(), vec![0, 1, 2]);
        assert_eq!(nb.switch_nodes("D"), Some((0, 1)));
        let mut neighbors = nb.neighbors(1);
        neighbors.sort();
        assert_eq!(neighbors, vec![(0, Some("D")), (2, Some("B"))]);
        Ok(())
    }

    #[test]
    fn test_bus_breaker_level_views() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL")
            .bus("VL", "B1")
            .bus("VL", "B2")
            .load("L1", TerminalSpec::at_bus("VL", "B1"))
            .load("L2", TerminalSpec::near_bus("VL", "B2"))
            .build();
        let coupler = SwitchSpec::between_buses("S", "VL", "B1", "B2");
        network.add_switch(coupler.with_open(true))?;
        let l2 = network.connectable("L2")?.terminals()[0].id();

        assert_eq!(
            network.node_breaker_view("VL").map(|_| ()),
            Err(Error::unsupported_view(
                "Voltage level 'VL' has no node/breaker view"
            ))
        );
        assert_eq!(network.bus_breaker_view("VL")?.buses().len(), 2);
        // B2 has no connected feeder
        let view = network.bus_view("VL")?;
        assert_eq!(view.buses().len(), 1);
        assert!(view.merged_bus("B2").is_none());
        assert!(!network.is_connected(l2)?);
        assert_eq!(network.terminal_bus(l2)?, None);
        assert_eq!(
            network.bus_breaker_view("VL")?.switch_buses("S"),
            Some(("B1".to_string(), "B2".to_string()))
        );
        Ok(())
    }
}
