// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Depth-first traversal of the terminals of a [`Network`].

use std::collections::HashSet;

use super::Network;
use crate::{
    equipment::{ConnectableKind, Switch, Terminal, TerminalKind, VoltageLevel},
    identifiable::{TerminalId, VoltageLevelId},
    topology::NodeBreakerEdge,
    Error, Identifiable,
};

/// What a traversal does after visiting a terminal or a switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraverseResult {
    /// Keep going past the visited element.
    Continue,
    /// Do not go past the visited element, but keep exploring elsewhere.
    TerminatePath,
    /// Stop the whole traversal.
    TerminateTraverser,
}

/**
A visitor for [`Network::traverse`].

Terminals are visited at most once per visited set.  Switches are visited at
most once per traversal, and by default the traversal does not cross open
switches.
*/
pub trait TopologyTraverser {
    fn traverse_terminal(&mut self, terminal: &Terminal) -> TraverseResult;

    fn traverse_switch(&mut self, switch: &Switch, variant: usize) -> TraverseResult {
        if switch.is_open(variant) {
            TraverseResult::TerminatePath
        } else {
            TraverseResult::Continue
        }
    }
}

struct Walk<'a, T: TopologyTraverser + ?Sized> {
    network: &'a Network,
    variant: usize,
    traverser: &'a mut T,
    visited: &'a mut HashSet<TerminalId>,
    nodes: HashSet<(VoltageLevelId, usize)>,
    buses: HashSet<(VoltageLevelId, String)>,
    switches: HashSet<(VoltageLevelId, String)>,
    stack: Vec<TerminalId>,
}

impl<T: TopologyTraverser + ?Sized> Walk<'_, T> {
    fn run(&mut self) -> Result<bool, Error> {
        let network = self.network;
        while let Some(id) = self.stack.pop() {
            if !self.visited.insert(id) {
                continue;
            }
            let terminal = network.terminal(id)?;
            match self.traverser.traverse_terminal(terminal) {
                TraverseResult::TerminateTraverser => return Ok(false),
                TraverseResult::TerminatePath => continue,
                TraverseResult::Continue => {}
            }

            let connectable = network.connectable_at(id.connectable())?;
            if matches!(
                connectable.kind(),
                ConnectableKind::Line(_)
                    | ConnectableKind::TwoWindingsTransformer(_)
                    | ConnectableKind::ThreeWindingsTransformer(_)
            ) {
                self.stack.extend(
                    connectable
                        .terminals()
                        .iter()
                        .map(|t| t.id())
                        .filter(|t| *t != id),
                );
            }

            let vl = network.voltage_level_at(terminal.voltage_level())?;
            let completed = match terminal.kind() {
                TerminalKind::Node { node } => self.walk_nodes(terminal.voltage_level(), vl, *node),
                TerminalKind::Bus { .. } => match terminal.connectable_bus(self.variant) {
                    Some(bus) if terminal.bus_connected(self.variant) == Some(true) => {
                        self.walk_buses(terminal.voltage_level(), vl, bus)
                    }
                    _ => true,
                },
            };
            if !completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Visits the switches reachable from `start` and stacks the terminals
    /// found at the nodes behind them.
    fn walk_nodes(&mut self, vl_key: VoltageLevelId, vl: &VoltageLevel, start: usize) -> bool {
        let Some(topology) = vl.topology.as_node_breaker() else {
            return true;
        };
        let mut pending = vec![start];
        self.nodes.insert((vl_key, start));
        while let Some(node) = pending.pop() {
            for (edge, other) in topology.adjacent(node) {
                if let NodeBreakerEdge::Switch(switch) = edge {
                    if !self.switches.insert((vl_key, switch.id().to_string())) {
                        continue;
                    }
                    match self.traverser.traverse_switch(switch, self.variant) {
                        TraverseResult::TerminateTraverser => return false,
                        TraverseResult::TerminatePath => continue,
                        TraverseResult::Continue => {}
                    }
                }
                if !self.nodes.insert((vl_key, other)) {
                    continue;
                }
                if let Some(terminal) = topology.terminal_at(other) {
                    self.stack.push(terminal);
                }
                pending.push(other);
            }
        }
        true
    }

    /// Visits the switches reachable from a configured bus and stacks the
    /// connected terminals of the buses behind them.
    fn walk_buses(&mut self, vl_key: VoltageLevelId, vl: &VoltageLevel, start: &str) -> bool {
        let Some(topology) = vl.topology.as_bus_breaker() else {
            return true;
        };
        if !self.buses.insert((vl_key, start.to_string())) {
            return true;
        }
        let (network, variant) = (self.network, self.variant);
        let mut pending = vec![start];
        while let Some(bus) = pending.pop() {
            if let Some(configured) = topology.bus(bus) {
                self.stack.extend(configured.terminals(variant).iter().copied().filter(|t| {
                    network
                        .terminal(*t)
                        .ok()
                        .and_then(|t| t.bus_connected(variant))
                        == Some(true)
                }));
            }
            for (switch, other) in topology.adjacent(bus) {
                if !self.switches.insert((vl_key, switch.id().to_string())) {
                    continue;
                }
                match self.traverser.traverse_switch(switch, self.variant) {
                    TraverseResult::TerminateTraverser => return false,
                    TraverseResult::TerminatePath => continue,
                    TraverseResult::Continue => {}
                }
                if self.buses.insert((vl_key, other.to_string())) {
                    pending.push(other);
                }
            }
        }
        true
    }
}

impl Network {
    /// Traverses the network depth-first from a terminal, in the working
    /// variant.
    ///
    /// The traversal goes through the switch graph of each voltage level and
    /// across lines and transformers to their other terminals.  The starting
    /// terminal is visited too.  Terminals already in `visited` are skipped,
    /// and every visited terminal is added to it.
    ///
    /// Returns `false` if the traverser stopped the traversal.
    pub fn traverse<T: TopologyTraverser + ?Sized>(
        &self,
        start: TerminalId,
        traverser: &mut T,
        visited: &mut HashSet<TerminalId>,
    ) -> Result<bool, Error> {
        let variant = self.working_variant()?;
        Walk {
            network: self,
            variant,
            traverser,
            visited,
            nodes: HashSet::new(),
            buses: HashSet::new(),
            switches: HashSet::new(),
            stack: vec![start],
        }
        .run()
    }
}
