// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Node-breaker topologies: numbered nodes joined by switches and internal
//! connections.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use super::{
    Bus, BusCache, BusMembers, FeederCounts, GraphChange, SwitchPredicate, TopologyContext,
    TopologyVariant, ViewKind,
};
use crate::{
    equipment::Switch,
    identifiable::{TerminalId, VoltageLevelId},
    variant::{MultiVariantObject, StateArray, VariantOp},
    Error, Identifiable, IdentifiableType,
};

/// A node, and the terminal attached to it if any.
#[derive(Clone, Debug)]
pub(crate) struct NodeSlot {
    node: usize,
    terminal: Option<TerminalId>,
}

/// An edge of a node-breaker graph.
#[derive(Clone, Debug)]
pub(crate) enum NodeBreakerEdge {
    Switch(Switch),
    /// A zero impedance connection that is always closed.
    InternalConnection,
}

impl NodeBreakerEdge {
    fn switch(&self) -> Option<&Switch> {
        match self {
            NodeBreakerEdge::Switch(switch) => Some(switch),
            NodeBreakerEdge::InternalConnection => None,
        }
    }

    /// Returns whether the edge joins its nodes into the same bus of the
    /// given view.
    fn is_closed(&self, view: ViewKind, variant: usize) -> bool {
        match (self, view) {
            (NodeBreakerEdge::InternalConnection, _) => true,
            (NodeBreakerEdge::Switch(switch), ViewKind::Bus) => !switch.is_open(variant),
            (NodeBreakerEdge::Switch(switch), ViewKind::BusBreaker) => {
                !switch.is_open(variant) && !switch.is_retained(variant)
            }
        }
    }
}

/// `NodeSlot`s stored in the graph are addressed by `NodeIndex`es.  This maps
/// node numbers to them.
type NodeIndexMap = HashMap<usize, NodeIndex>;

pub(crate) struct NodeBreakerTopology {
    voltage_level: VoltageLevelId,
    voltage_level_id: String,
    max_node_index: usize,
    graph: StableUnGraph<NodeSlot, NodeBreakerEdge>,
    node_indices: NodeIndexMap,
    switches: IndexMap<String, EdgeIndex>,
    caches: StateArray<TopologyVariant>,
}

impl NodeBreakerTopology {
    pub(crate) fn new(
        voltage_level: VoltageLevelId,
        voltage_level_id: String,
        max_node_index: usize,
        variant_array_size: usize,
    ) -> Self {
        Self {
            voltage_level,
            voltage_level_id,
            max_node_index,
            graph: StableUnGraph::default(),
            node_indices: NodeIndexMap::new(),
            switches: IndexMap::new(),
            caches: StateArray::new(variant_array_size, TopologyVariant::default),
        }
    }

    pub(crate) fn caches(&self) -> &StateArray<TopologyVariant> {
        &self.caches
    }

    pub(crate) fn max_node_index(&self) -> usize {
        self.max_node_index
    }

    fn check_node(&self, owner: &str, node: usize) -> Result<(), Error> {
        if node > self.max_node_index {
            return Err(Error::validation(format!(
                "{owner}: node {node} is out of range [0, {}] in voltage level '{}'",
                self.max_node_index, self.voltage_level_id
            )));
        }
        Ok(())
    }

    fn ensure_node(&mut self, node: usize) -> NodeIndex {
        if let Some(index) = self.node_indices.get(&node) {
            return *index;
        }
        let index = self.graph.add_node(NodeSlot {
            node,
            terminal: None,
        });
        self.node_indices.insert(node, index);
        index
    }

    /// Returns the numbers of the nodes in use, sorted.
    pub(crate) fn nodes(&self) -> Vec<usize> {
        let mut nodes = self.node_indices.keys().copied().collect::<Vec<_>>();
        nodes.sort_unstable();
        nodes
    }

    pub(crate) fn terminal_at(&self, node: usize) -> Option<TerminalId> {
        self.node_indices
            .get(&node)
            .and_then(|index| self.graph[*index].terminal)
    }

    /// Checks that a terminal could be attached at `node`.
    pub(crate) fn check_attach(&self, owner: &str, node: usize) -> Result<(), Error> {
        self.check_node(owner, node)?;
        if self.terminal_at(node).is_some() {
            return Err(Error::validation(format!(
                "{owner}: an equipment is already connected to node {node} of voltage level '{}'",
                self.voltage_level_id
            )));
        }
        Ok(())
    }

    pub(crate) fn attach(
        &mut self,
        terminal: TerminalId,
        node: usize,
    ) -> Result<GraphChange, Error> {
        self.check_attach(&format!("Terminal {terminal:?}"), node)?;
        let index = self.ensure_node(node);
        self.graph[index].terminal = Some(terminal);
        Ok(GraphChange::AllVariants)
    }

    pub(crate) fn detach(
        &mut self,
        terminal: TerminalId,
        node: usize,
    ) -> Result<GraphChange, Error> {
        let index = self
            .node_indices
            .get(&node)
            .copied()
            .filter(|index| self.graph[*index].terminal == Some(terminal))
            .ok_or_else(|| {
                Error::internal(format!(
                    "Terminal {terminal:?} is not attached to node {node} of voltage level '{}'",
                    self.voltage_level_id
                ))
            })?;
        self.graph[index].terminal = None;
        self.clean();
        Ok(GraphChange::AllVariants)
    }

    /// Removes the nodes that have neither a terminal nor an edge.
    fn clean(&mut self) {
        let isolated = self
            .graph
            .node_indices()
            .filter(|index| {
                self.graph[*index].terminal.is_none()
                    && self.graph.neighbors(*index).next().is_none()
            })
            .collect::<Vec<_>>();
        for index in isolated {
            if let Some(slot) = self.graph.remove_node(index) {
                self.node_indices.remove(&slot.node);
            }
        }
    }

    fn check_edge(&self, owner: &str, node1: usize, node2: usize) -> Result<(), Error> {
        self.check_node(owner, node1)?;
        self.check_node(owner, node2)?;
        if node1 == node2 {
            return Err(Error::validation(format!(
                "{owner}: both ends are on node {node1}"
            )));
        }
        Ok(())
    }

    pub(crate) fn check_switch(
        &self,
        switch_id: &str,
        node1: usize,
        node2: usize,
    ) -> Result<(), Error> {
        self.check_edge(&format!("Switch '{switch_id}'"), node1, node2)
    }

    pub(crate) fn add_switch(
        &mut self,
        switch: Switch,
        node1: usize,
        node2: usize,
    ) -> Result<GraphChange, Error> {
        self.check_switch(switch.id(), node1, node2)?;
        let a = self.ensure_node(node1);
        let b = self.ensure_node(node2);
        let id = switch.id().to_string();
        let edge = self.graph.add_edge(a, b, NodeBreakerEdge::Switch(switch));
        self.switches.insert(id, edge);
        Ok(GraphChange::AllVariants)
    }

    pub(crate) fn add_internal_connection(
        &mut self,
        node1: usize,
        node2: usize,
    ) -> Result<GraphChange, Error> {
        self.check_edge("Internal connection", node1, node2)?;
        let a = self.ensure_node(node1);
        let b = self.ensure_node(node2);
        self.graph
            .add_edge(a, b, NodeBreakerEdge::InternalConnection);
        Ok(GraphChange::AllVariants)
    }

    pub(crate) fn internal_connections(&self) -> Vec<(usize, usize)> {
        self.graph
            .edge_references()
            .filter(|edge| matches!(edge.weight(), NodeBreakerEdge::InternalConnection))
            .map(|edge| {
                (
                    self.graph[edge.source()].node,
                    self.graph[edge.target()].node,
                )
            })
            .collect()
    }

    pub(crate) fn switch(&self, id: &str) -> Option<&Switch> {
        self.switches
            .get(id)
            .and_then(|edge| self.graph.edge_weight(*edge))
            .and_then(NodeBreakerEdge::switch)
    }

    pub(crate) fn switch_mut(&mut self, id: &str) -> Option<&mut Switch> {
        let edge = *self.switches.get(id)?;
        match self.graph.edge_weight_mut(edge) {
            Some(NodeBreakerEdge::Switch(switch)) => Some(switch),
            _ => None,
        }
    }

    /// Returns the switches, in insertion order.
    pub(crate) fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.switches
            .values()
            .filter_map(|edge| self.graph.edge_weight(*edge))
            .filter_map(NodeBreakerEdge::switch)
    }

    pub(crate) fn switch_nodes(&self, id: &str) -> Option<(usize, usize)> {
        let edge = self.switches.get(id)?;
        let (a, b) = self.graph.edge_endpoints(*edge)?;
        Some((self.graph[a].node, self.graph[b].node))
    }

    pub(crate) fn remove_switch(&mut self, id: &str) -> Result<(Switch, GraphChange), Error> {
        let edge = self
            .switches
            .shift_remove(id)
            .ok_or_else(|| Error::element_not_found(format!("Switch '{id}' not found")))?;
        match self.graph.remove_edge(edge) {
            Some(NodeBreakerEdge::Switch(switch)) => {
                self.clean();
                Ok((switch, GraphChange::AllVariants))
            }
            _ => Err(Error::internal(format!(
                "Switch '{id}' is not an edge of voltage level '{}'",
                self.voltage_level_id
            ))),
        }
    }

    /// Returns the edges at `node`, each with the node at its other end.
    pub(crate) fn adjacent(&self, node: usize) -> Vec<(&NodeBreakerEdge, usize)> {
        let Some(&index) = self.node_indices.get(&node) else {
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
                (edge.weight(), self.graph[other].node)
            })
            .collect()
    }

    fn is_busbar_section(&self, index: NodeIndex, context: &TopologyContext<'_>) -> bool {
        self.graph[index]
            .terminal
            .and_then(|terminal| context.connectable_type(terminal))
            == Some(IdentifiableType::BusbarSection)
    }

    /// Splits the nodes into buses.
    ///
    /// In the bus-breaker view every group of nodes joined by closed,
    /// non-retained switches is a bus.  In the bus view open switches alone
    /// separate buses, and a group is only a bus if it holds a busbar section
    /// and a feeder, or a branch and two feeders.  In voltage levels without
    /// busbar sections a single feeder makes a bus.
    pub(crate) fn compute_buses(
        &self,
        view: ViewKind,
        variant: usize,
        context: &TopologyContext<'_>,
    ) -> BusCache {
        let mut starts = self.node_indices.iter().collect::<Vec<_>>();
        starts.sort_unstable_by_key(|(node, _)| **node);

        let has_busbar_sections = view == ViewKind::Bus
            && starts
                .iter()
                .any(|(_, index)| self.is_busbar_section(**index, context));

        let mut visited = HashSet::new();
        let mut taken = HashSet::new();
        let mut buses = Vec::new();

        for (_, &start) in starts {
            if !visited.insert(start) {
                continue;
            }
            let mut stack = vec![start];
            let mut nodes = Vec::new();
            while let Some(index) = stack.pop() {
                nodes.push(self.graph[index].node);
                for edge in self.graph.edges(index) {
                    if !edge.weight().is_closed(view, variant) {
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
            nodes.sort_unstable();
            let terminals = nodes
                .iter()
                .filter_map(|node| self.terminal_at(*node))
                .collect::<Vec<_>>();

            let valid = match view {
                ViewKind::BusBreaker => true,
                ViewKind::Bus => {
                    let counts = FeederCounts::count(&terminals, context);
                    if has_busbar_sections {
                        (counts.busbar_sections >= 1 && counts.feeders >= 1)
                            || (counts.branches >= 1 && counts.feeders >= 2)
                    } else {
                        counts.feeders >= 1
                    }
                }
            };
            if !valid {
                continue;
            }

            let id = context.unique_bus_id(
                format!("{}_{}", self.voltage_level_id, nodes[0]),
                &taken,
            );
            taken.insert(id.clone());
            buses.push(Bus::new(
                id,
                self.voltage_level,
                BusMembers::Nodes(nodes),
                terminals,
            ));
        }
        tracing::trace!(
            "Voltage level '{}' has {} buses in the {view:?} view of variant {variant}",
            self.voltage_level_id,
            buses.len()
        );
        BusCache::new(buses)
    }

    /// Collects every simple path from `start` to a target node.  Paths stop
    /// at the first target they reach, and never cross a blocked edge.
    fn find_all_paths(
        &self,
        start: NodeIndex,
        is_target: &impl Fn(NodeIndex) -> bool,
        is_blocked: &impl Fn(&NodeBreakerEdge) -> bool,
    ) -> Vec<Vec<EdgeIndex>> {
        let mut paths = Vec::new();
        let mut on_path = HashSet::from([start]);
        let mut path = Vec::new();
        self.extend_paths(
            start,
            is_target,
            is_blocked,
            &mut on_path,
            &mut path,
            &mut paths,
        );
        paths
    }

    fn extend_paths(
        &self,
        from: NodeIndex,
        is_target: &impl Fn(NodeIndex) -> bool,
        is_blocked: &impl Fn(&NodeBreakerEdge) -> bool,
        on_path: &mut HashSet<NodeIndex>,
        path: &mut Vec<EdgeIndex>,
        paths: &mut Vec<Vec<EdgeIndex>>,
    ) {
        for edge in self.graph.edges(from) {
            if is_blocked(edge.weight()) {
                continue;
            }
            let other = if edge.source() == from {
                edge.target()
            } else {
                edge.source()
            };
            if on_path.contains(&other) {
                continue;
            }
            path.push(edge.id());
            if is_target(other) {
                paths.push(path.clone());
            } else {
                on_path.insert(other);
                self.extend_paths(other, is_target, is_blocked, on_path, path, paths);
                on_path.remove(&other);
            }
            path.pop();
        }
    }

    fn edge_switch(&self, edge: EdgeIndex) -> Option<&Switch> {
        self.graph
            .edge_weight(edge)
            .and_then(NodeBreakerEdge::switch)
    }

    /// Finds the open switches to close to connect `node` to a busbar
    /// section.
    ///
    /// Only open switches accepted by `predicate` may be closed.  Among the
    /// feasible paths, the one with the fewest open switches wins, then the
    /// shortest one.  Returns `None` if no path is feasible.
    pub(crate) fn closing_switches(
        &self,
        node: usize,
        variant: usize,
        predicate: SwitchPredicate,
        context: &TopologyContext<'_>,
    ) -> Option<Vec<String>> {
        let start = *self.node_indices.get(&node)?;
        let paths = self.find_all_paths(
            start,
            &|index: NodeIndex| self.is_busbar_section(index, context),
            &|edge: &NodeBreakerEdge| {
                edge.switch()
                    .is_some_and(|s| s.is_open(variant) && !predicate.test(s, variant))
            },
        );

        let open_switches = |path: &Vec<EdgeIndex>| {
            path.iter()
                .filter_map(|edge| self.edge_switch(*edge))
                .filter(|switch| switch.is_open(variant))
                .collect::<Vec<_>>()
        };
        let best = paths
            .iter()
            .min_by_key(|path| (open_switches(*path).len(), path.len()))?;
        Some(
            open_switches(best)
                .into_iter()
                .map(|switch| switch.id().to_string())
                .collect(),
        )
    }

    /// Finds the switches to open to disconnect `node` from every busbar
    /// section it is connected to.
    ///
    /// On each closed path to a busbar section the first switch accepted by
    /// `predicate` is opened.  Returns `None` if `node` is not connected to
    /// any busbar section, or if a path has no switch that may be opened.
    pub(crate) fn opening_switches(
        &self,
        node: usize,
        variant: usize,
        predicate: SwitchPredicate,
        context: &TopologyContext<'_>,
    ) -> Option<Vec<String>> {
        let start = *self.node_indices.get(&node)?;
        let paths = self.find_all_paths(
            start,
            &|index: NodeIndex| self.is_busbar_section(index, context),
            &|edge: &NodeBreakerEdge| edge.switch().is_some_and(|s| s.is_open(variant)),
        );
        if paths.is_empty() {
            return None;
        }

        let mut to_open: Vec<String> = Vec::new();
        for path in &paths {
            let switches = path
                .iter()
                .filter_map(|edge| self.edge_switch(*edge))
                .collect::<Vec<_>>();
            if switches
                .iter()
                .any(|s| to_open.iter().any(|id| id == s.id()))
            {
                continue;
            }
            let switch = switches
                .into_iter()
                .find(|switch| predicate.test(switch, variant))?;
            to_open.push(switch.id().to_string());
        }
        Some(to_open)
    }
}

impl MultiVariantObject for NodeBreakerTopology {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        for edge in self.graph.edge_weights_mut() {
            if let NodeBreakerEdge::Switch(switch) = edge {
                switch.apply_variant_op(op);
            }
        }
        self.caches.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.caches.variant_array_size()
    }
}
