// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Connected and synchronous components of the buses of a [`Network`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use petgraph::unionfind::UnionFind;

use super::Network;
use crate::{
    equipment::ConnectableKind,
    identifiable::{TerminalId, VoltageLevelId},
    topology::{GraphChange, ViewKind},
    variant::VariantState,
    Error, Identifiable,
};

/// Which equipment joins buses into a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Buses joined by lines, transformers or HVDC lines.
    Connected,
    /// Buses joined by AC equipment only.
    Synchronous,
}

/// A set of buses of the bus view joined by equipment.
///
/// Components are numbered by decreasing number of buses, so number 0 is the
/// main component.  Numbers are only meaningful until the next topology
/// change.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    kind: ComponentKind,
    number: usize,
    buses: Vec<String>,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Returns the ids of the buses of the component.
    pub fn buses(&self) -> &[String] {
        &self.buses
    }

    pub fn size(&self) -> usize {
        self.buses.len()
    }
}

/// The components of one variant, with a lookup from buses.
#[derive(Debug)]
struct ComponentAssignment {
    components: Vec<Component>,
    by_bus: HashMap<(VoltageLevelId, String), usize>,
}

/// The components of one variant, computed on first use.
#[derive(Default)]
pub(crate) struct ComponentsVariant {
    connected: Mutex<Option<Arc<ComponentAssignment>>>,
    synchronous: Mutex<Option<Arc<ComponentAssignment>>>,
}

impl ComponentsVariant {
    fn cell(&self, kind: ComponentKind) -> &Mutex<Option<Arc<ComponentAssignment>>> {
        match kind {
            ComponentKind::Connected => &self.connected,
            ComponentKind::Synchronous => &self.synchronous,
        }
    }

    fn invalidate(&self) {
        *self.connected.lock() = None;
        *self.synchronous.lock() = None;
    }
}

impl VariantState for ComponentsVariant {
    fn copy(&self) -> Self {
        Self::default()
    }
}

impl Network {
    pub(super) fn invalidate_components(&self, change: GraphChange) {
        match change {
            GraphChange::Unchanged => {}
            GraphChange::Variant(variant) => self.components.get(variant).invalidate(),
            GraphChange::AllVariants => self
                .components
                .iter()
                .for_each(ComponentsVariant::invalidate),
        }
    }

    fn component_assignment(
        &self,
        kind: ComponentKind,
        variant: usize,
    ) -> Arc<ComponentAssignment> {
        let mut cell = self.components.get(variant).cell(kind).lock();
        cell.get_or_insert_with(|| Arc::new(self.compute_components(kind, variant)))
            .clone()
    }

    /// Partitions the buses of the bus view into components.
    fn compute_components(&self, kind: ComponentKind, variant: usize) -> ComponentAssignment {
        let context = self.context();
        let mut buses = Vec::new();
        let mut bus_of_terminal = HashMap::new();
        for (vl_key, vl) in self.voltage_levels.iter() {
            for bus in vl.topology.view(ViewKind::Bus, variant, &context).buses() {
                for terminal in bus.terminals() {
                    bus_of_terminal.insert(*terminal, buses.len());
                }
                buses.push((vl_key, bus.id().to_string()));
            }
        }

        let mut sets = UnionFind::<usize>::new(buses.len());
        let mut join = |terminals: &mut dyn Iterator<Item = TerminalId>| {
            let mut first = None;
            for terminal in terminals {
                let Some(&bus) = bus_of_terminal.get(&terminal) else {
                    continue;
                };
                match first {
                    None => first = Some(bus),
                    Some(first) => {
                        sets.union(first, bus);
                    }
                }
            }
        };

        for (_, connectable) in self.connectables.iter() {
            match connectable.kind() {
                ConnectableKind::Line(_)
                | ConnectableKind::TwoWindingsTransformer(_)
                | ConnectableKind::ThreeWindingsTransformer(_) => {
                    join(&mut connectable.terminals().iter().map(|t| t.id()));
                }
                _ => {}
            }
        }
        if kind == ComponentKind::Connected {
            for (_, line) in self.hvdc_lines.iter() {
                join(
                    &mut line
                        .converter_stations()
                        .into_iter()
                        .filter_map(|station| self.connectables.get(station))
                        .flat_map(|station| station.terminals().iter().map(|t| t.id())),
                );
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for bus in 0..buses.len() {
            groups.entry(sets.find(bus)).or_default().push(bus);
        }
        let mut groups = groups.into_values().collect::<Vec<_>>();
        // Ties keep the order in which the buses were found.
        groups.sort_by_key(|members| (std::cmp::Reverse(members.len()), members[0]));

        let mut by_bus = HashMap::new();
        let components = groups
            .into_iter()
            .enumerate()
            .map(|(number, members)| Component {
                kind,
                number,
                buses: members
                    .into_iter()
                    .map(|bus| {
                        by_bus.insert(buses[bus].clone(), number);
                        buses[bus].1.clone()
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            "Found {} {kind:?} components over {} buses in variant {variant}",
            components.len(),
            buses.len()
        );
        ComponentAssignment { components, by_bus }
    }

    /// Returns the connected components of the working variant, main
    /// component first.
    pub fn connected_components(&self) -> Result<Vec<Component>, Error> {
        self.components_of(ComponentKind::Connected)
    }

    /// Returns the synchronous components of the working variant, main
    /// component first.
    pub fn synchronous_components(&self) -> Result<Vec<Component>, Error> {
        self.components_of(ComponentKind::Synchronous)
    }

    fn components_of(&self, kind: ComponentKind) -> Result<Vec<Component>, Error> {
        let variant = self.working_variant()?;
        Ok(self.component_assignment(kind, variant).components.clone())
    }

    /// Returns the number of the component the terminal is in, or `None` if
    /// the terminal is not on a bus of the bus view.
    pub fn component_number(
        &self,
        terminal: TerminalId,
        kind: ComponentKind,
    ) -> Result<Option<usize>, Error> {
        let variant = self.working_variant()?;
        let Some(bus) = self.bus_view_bus_of(terminal, variant)? else {
            return Ok(None);
        };
        Ok(self
            .component_assignment(kind, variant)
            .by_bus
            .get(&(bus.voltage_level(), bus.id().to_string()))
            .copied())
    }

    /// Returns the number of the component of a bus.
    ///
    /// `bus_id` is the id of a bus of the bus view, or of a configured bus of
    /// a bus-breaker voltage level.  Returns `None` if the bus is not part of
    /// the bus view.
    pub fn bus_component_number(
        &self,
        voltage_level: &str,
        bus_id: &str,
        kind: ComponentKind,
    ) -> Result<Option<usize>, Error> {
        let variant = self.working_variant()?;
        let vl_key = self.voltage_level_key(voltage_level)?;
        let vl = self.voltage_level_at(vl_key)?;
        let view = vl.topology.view(ViewKind::Bus, variant, &self.context());
        let bus = match view.bus(bus_id) {
            Some(bus) => Some(bus.clone()),
            None => {
                if vl
                    .topology
                    .as_bus_breaker()
                    .and_then(|t| t.bus(bus_id))
                    .is_none()
                {
                    return Err(Error::element_not_found(format!(
                        "Bus '{bus_id}' not found in voltage level '{voltage_level}'"
                    )));
                }
                view.bus_of_configured_bus(bus_id).cloned()
            }
        };
        let Some(bus) = bus else {
            return Ok(None);
        };
        Ok(self
            .component_assignment(kind, variant)
            .by_bus
            .get(&(vl_key, bus.id().to_string()))
            .copied())
    }

    pub fn is_in_main_connected_component(&self, terminal: TerminalId) -> Result<bool, Error> {
        Ok(self.component_number(terminal, ComponentKind::Connected)? == Some(0))
    }

    pub fn is_in_main_synchronous_component(&self, terminal: TerminalId) -> Result<bool, Error> {
        Ok(self.component_number(terminal, ComponentKind::Synchronous)? == Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        equipment::{LineSpec, SwitchSpec, TerminalSpec},
        network::test_utils::NetworkBuilder,
    };

    #[test]
    fn test_components_follow_switches() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL")
            .bus("VL", "A")
            .bus("VL", "B")
            .bus("VL", "C")
            .load("LA", TerminalSpec::at_bus("VL", "A"))
            .load("LB", TerminalSpec::at_bus("VL", "B"))
            .load("LC", TerminalSpec::at_bus("VL", "C"))
            .build();
        network.add_switch(SwitchSpec::between_buses("AB", "VL", "A", "B"))?;
        let coupler = SwitchSpec::between_buses("BC", "VL", "B", "C");
        network.add_switch(coupler.with_open(true))?;

        let number = |network: &Network, bus: &str| {
            network
                .bus_component_number("VL", bus, ComponentKind::Connected)
                .unwrap()
        };
        assert_eq!(number(&network, "A"), Some(0));
        assert_eq!(number(&network, "B"), Some(0));
        assert_eq!(number(&network, "C"), Some(1));

        network.set_switch_open("BC", false)?;
        assert_eq!(number(&network, "A"), Some(0));
        assert_eq!(number(&network, "B"), Some(0));
        assert_eq!(number(&network, "C"), Some(0));
        assert_eq!(network.connected_components()?.len(), 1);
        assert_eq!(
            network.bus_component_number("VL", "D", ComponentKind::Connected),
            Err(Error::element_not_found(
                "Bus 'D' not found in voltage level 'VL'"
            ))
        );
        Ok(())
    }

    #[test]
    fn test_hvdc_lines_split_synchronous_components() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL1")
            .bus_breaker_level("VL2")
            .bus_breaker_level("VL3")
            .bus("VL1", "B1")
            .bus("VL2", "B2")
            .bus("VL3", "B3")
            .load("L1", TerminalSpec::at_bus("VL1", "B1"))
            .load("L3", TerminalSpec::at_bus("VL3", "B3"))
            .converter_station("CS1", TerminalSpec::at_bus("VL1", "B1"))
            .converter_station("CS2", TerminalSpec::at_bus("VL2", "B2"))
            .hvdc_line("HVDC", "CS1", "CS2")
            .build();
        network.add_line(LineSpec {
            id: "LINE".into(),
            terminal1: TerminalSpec::at_bus("VL2", "B2"),
            terminal2: TerminalSpec::at_bus("VL3", "B3"),
            x: 1.0,
            ..Default::default()
        })?;

        let connected = network.connected_components()?;
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].size(), 3);

        let synchronous = network.synchronous_components()?;
        assert_eq!(synchronous.len(), 2);
        assert_eq!(
            synchronous[0].buses(),
            &["VL2_0".to_string(), "VL3_0".to_string()],
        );
        assert_eq!(synchronous[1].buses(), &["VL1_0".to_string()]);

        let l1 = network.connectable("L1")?.terminals()[0].id();
        let l3 = network.connectable("L3")?.terminals()[0].id();
        assert!(network.is_in_main_connected_component(l1)?);
        assert!(!network.is_in_main_synchronous_component(l1)?);
        assert!(network.is_in_main_synchronous_component(l3)?);

        // the line going out of service splits the connected component too
        network.disconnect_connectable("LINE")?;
        assert_eq!(network.connected_components()?.len(), 2);
        assert_eq!(
            network.component_number(l3, ComponentKind::Connected)?,
            Some(1)
        );
        Ok(())
    }
}
