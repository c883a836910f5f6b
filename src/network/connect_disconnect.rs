// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Connection and disconnection of groups of terminals.
//!
//! A group of terminals is connected or disconnected as a whole: the
//! switches to operate and the bus-breaker terminals to flip are first
//! planned for every terminal, and nothing is changed unless every terminal
//! has a plan.  Infeasible operations are reported as `Ok(false)`.

use indexmap::IndexSet;
use tracing::{info, trace};

use super::{attributes::terminal_attribute, Network};
use crate::{
    equipment::{Side, TerminalKind},
    identifiable::{ElementRef, TerminalId},
    topology::{GraphChange, SwitchPredicate},
    Error, Identifiable,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Connect,
    Disconnect,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Connect => write!(f, "connect"),
            Action::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Topology changes collected by the `stage_*` methods of a [`Network`], to
/// be applied together with [`Network::apply_staged`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedTopologyChange {
    switches_to_close: IndexSet<String>,
    switches_to_open: IndexSet<String>,
    terminals_to_connect: IndexSet<TerminalId>,
    terminals_to_disconnect: IndexSet<TerminalId>,
}

impl StagedTopologyChange {
    pub fn switches_to_close(&self) -> impl Iterator<Item = &str> {
        self.switches_to_close.iter().map(String::as_str)
    }

    pub fn switches_to_open(&self) -> impl Iterator<Item = &str> {
        self.switches_to_open.iter().map(String::as_str)
    }

    /// Returns the bus-breaker terminals to connect to their bus.
    pub fn terminals_to_connect(&self) -> impl Iterator<Item = TerminalId> + '_ {
        self.terminals_to_connect.iter().copied()
    }

    /// Returns the bus-breaker terminals to disconnect from their bus.
    pub fn terminals_to_disconnect(&self) -> impl Iterator<Item = TerminalId> + '_ {
        self.terminals_to_disconnect.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.switches_to_close.is_empty()
            && self.switches_to_open.is_empty()
            && self.terminals_to_connect.is_empty()
            && self.terminals_to_disconnect.is_empty()
    }

    /// Adds the changes of `other` to this one.
    pub fn merge(&mut self, other: StagedTopologyChange) {
        self.switches_to_close.extend(other.switches_to_close);
        self.switches_to_open.extend(other.switches_to_open);
        self.terminals_to_connect.extend(other.terminals_to_connect);
        self.terminals_to_disconnect
            .extend(other.terminals_to_disconnect);
    }
}

impl Network {
    /// Plans the connection or disconnection of all the given terminals in
    /// the working variant.
    ///
    /// Returns `None` when there is nothing to do, or when one of the
    /// terminals cannot be connected or disconnected with the switches
    /// accepted by `predicate`.
    fn plan(
        &self,
        terminals: &[TerminalId],
        action: Action,
        predicate: SwitchPredicate,
        propagate: bool,
    ) -> Result<Option<StagedTopologyChange>, Error> {
        let variant = self.working_variant()?;
        let context = self.context();
        let mut staged = StagedTopologyChange::default();
        let mut examined = false;

        for &id in terminals {
            let terminal = self.terminal(id)?;
            let vl = self.voltage_level_at(terminal.voltage_level())?;
            let connected = self.is_connected_in(id, variant)?;
            let skip = match action {
                Action::Connect => connected && !(propagate && vl.is_fictitious()),
                Action::Disconnect => !connected,
            };
            if skip {
                trace!("Terminal {id:?} in voltage level '{}': nothing to {action}", vl.id());
                continue;
            }
            examined = true;

            match terminal.kind() {
                TerminalKind::Node { node } => {
                    let topology = vl.topology.as_node_breaker().ok_or_else(|| {
                        Error::internal(format!(
                            "Terminal {id:?} is on a node of bus/breaker voltage level '{}'",
                            vl.id()
                        ))
                    })?;
                    let switches = match action {
                        Action::Connect => {
                            topology.closing_switches(*node, variant, predicate, &context)
                        }
                        Action::Disconnect => {
                            topology.opening_switches(*node, variant, predicate, &context)
                        }
                    };
                    let Some(switches) = switches else {
                        info!(
                            "Cannot {action} terminal {id:?}: no usable switch path from node \
                             {node} of voltage level '{}'",
                            vl.id()
                        );
                        return Ok(None);
                    };
                    trace!("Terminal {id:?}: switches to operate {switches:?}");
                    match action {
                        Action::Connect => staged.switches_to_close.extend(switches),
                        Action::Disconnect => staged.switches_to_open.extend(switches),
                    }
                }
                TerminalKind::Bus { .. } => {
                    match action {
                        Action::Connect => staged.terminals_to_connect.insert(id),
                        Action::Disconnect => staged.terminals_to_disconnect.insert(id),
                    };
                }
            }
        }

        if !examined {
            info!("Nothing to {action}: every terminal is already in the requested state");
            return Ok(None);
        }
        Ok(Some(staged))
    }

    fn plan_and_apply(
        &mut self,
        terminals: &[TerminalId],
        action: Action,
        predicate: SwitchPredicate,
        propagate: bool,
    ) -> Result<bool, Error> {
        match self.plan(terminals, action, predicate, propagate)? {
            Some(staged) => self.apply_staged(staged),
            None => Ok(false),
        }
    }

    fn plan_and_stage(
        &self,
        terminals: &[TerminalId],
        action: Action,
        predicate: SwitchPredicate,
        propagate: bool,
        into: &mut StagedTopologyChange,
    ) -> Result<bool, Error> {
        match self.plan(terminals, action, predicate, propagate)? {
            Some(staged) => {
                into.merge(staged);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Connects all the given terminals, or none of them.
    ///
    /// Node-breaker terminals are connected by closing open switches
    /// accepted by `predicate` on a path to a busbar section.  With
    /// `propagate`, terminals of fictitious voltage levels are examined even
    /// when they are already connected.
    ///
    /// Returns `false` when nothing was changed.
    pub fn connect_terminals(
        &mut self,
        terminals: &[TerminalId],
        predicate: SwitchPredicate,
        propagate: bool,
    ) -> Result<bool, Error> {
        self.plan_and_apply(terminals, Action::Connect, predicate, propagate)
    }

    /// Disconnects all the given terminals, or none of them.
    ///
    /// Node-breaker terminals are disconnected by opening, on every closed
    /// path to a busbar section, the first switch accepted by `predicate`.
    pub fn disconnect_terminals(
        &mut self,
        terminals: &[TerminalId],
        predicate: SwitchPredicate,
    ) -> Result<bool, Error> {
        self.plan_and_apply(terminals, Action::Disconnect, predicate, false)
    }

    /// Plans the connection of the given terminals into `staged` instead of
    /// applying it.  Returns `false`, leaving `staged` untouched, when the
    /// connection is infeasible or there is nothing to do.
    pub fn stage_connection(
        &self,
        terminals: &[TerminalId],
        predicate: SwitchPredicate,
        propagate: bool,
        staged: &mut StagedTopologyChange,
    ) -> Result<bool, Error> {
        self.plan_and_stage(terminals, Action::Connect, predicate, propagate, staged)
    }

    pub fn stage_disconnection(
        &self,
        terminals: &[TerminalId],
        predicate: SwitchPredicate,
        staged: &mut StagedTopologyChange,
    ) -> Result<bool, Error> {
        self.plan_and_stage(terminals, Action::Disconnect, predicate, false, staged)
    }

    /// Applies staged topology changes to the working variant.
    ///
    /// All the switches and terminals are checked to exist before anything
    /// is changed.  Returns `false` if `staged` is empty.
    pub fn apply_staged(&mut self, staged: StagedTopologyChange) -> Result<bool, Error> {
        for id in staged
            .switches_to_close
            .iter()
            .chain(&staged.switches_to_open)
        {
            if !matches!(self.index.get(id), Some(ElementRef::Switch(_))) {
                return Err(Error::element_not_found(format!("Switch '{id}' not found")));
            }
        }
        for id in staged
            .terminals_to_connect
            .iter()
            .chain(&staged.terminals_to_disconnect)
        {
            if !matches!(self.terminal(*id)?.kind(), TerminalKind::Bus { .. }) {
                return Err(Error::invalid_topology(format!(
                    "Terminal {id:?} is not a bus/breaker terminal"
                )));
            }
        }
        if staged.is_empty() {
            return Ok(false);
        }

        for id in &staged.switches_to_close {
            self.set_switch_open(id, false)?;
        }
        for id in &staged.switches_to_open {
            self.set_switch_open(id, true)?;
        }
        for id in &staged.terminals_to_connect {
            self.set_bus_terminal_connected(*id, true)?;
        }
        for id in &staged.terminals_to_disconnect {
            self.set_bus_terminal_connected(*id, false)?;
        }
        Ok(true)
    }

    fn set_bus_terminal_connected(&mut self, id: TerminalId, connected: bool) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let terminal = self.terminal_mut(id)?;
        let vl_key = terminal.voltage_level();
        let old = terminal.set_bus_connected(variant, connected);
        if old == Some(connected) {
            return Ok(());
        }
        self.propagate(vl_key, GraphChange::Variant(variant));
        let owner = self.connectable_at(id.connectable())?.id().to_string();
        self.notify_update(
            &owner,
            &terminal_attribute("connected", id),
            Some(variant),
            old.into(),
            connected.into(),
        );
        Ok(())
    }

    fn connectable_terminals(&self, id: &str) -> Result<Vec<TerminalId>, Error> {
        Ok(self
            .connectable(id)?
            .terminals()
            .iter()
            .map(|t| t.id())
            .collect())
    }

    fn connectable_side(&self, id: &str, side: Side) -> Result<TerminalId, Error> {
        self.connectable(id)?
            .terminal(side)
            .map(|t| t.id())
            .ok_or_else(|| {
                Error::element_not_found(format!("'{id}' has no terminal on side {side:?}"))
            })
    }

    /// Connects every terminal of a connectable with the default switch
    /// predicate.
    pub fn connect_connectable(&mut self, id: &str) -> Result<bool, Error> {
        let terminals = self.connectable_terminals(id)?;
        self.connect_terminals(&terminals, SwitchPredicate::NonFictitiousBreaker, false)
    }

    pub fn connect_connectable_with(
        &mut self,
        id: &str,
        predicate: SwitchPredicate,
    ) -> Result<bool, Error> {
        let terminals = self.connectable_terminals(id)?;
        self.connect_terminals(&terminals, predicate, false)
    }

    /// Disconnects every terminal of a connectable with the default switch
    /// predicate.
    pub fn disconnect_connectable(&mut self, id: &str) -> Result<bool, Error> {
        let terminals = self.connectable_terminals(id)?;
        self.disconnect_terminals(&terminals, SwitchPredicate::ClosedBreaker)
    }

    pub fn disconnect_connectable_with(
        &mut self,
        id: &str,
        predicate: SwitchPredicate,
    ) -> Result<bool, Error> {
        let terminals = self.connectable_terminals(id)?;
        self.disconnect_terminals(&terminals, predicate)
    }

    /// Connects one side of a connectable.
    pub fn connect_side(&mut self, id: &str, side: Side) -> Result<bool, Error> {
        let terminal = self.connectable_side(id, side)?;
        self.connect_terminals(&[terminal], SwitchPredicate::NonFictitiousBreaker, false)
    }

    /// Disconnects one side of a connectable.
    pub fn disconnect_side(&mut self, id: &str, side: Side) -> Result<bool, Error> {
        let terminal = self.connectable_side(id, side)?;
        self.disconnect_terminals(&[terminal], SwitchPredicate::ClosedBreaker)
    }

    fn hvdc_terminals(&self, id: &str) -> Result<Vec<TerminalId>, Error> {
        let mut terminals = Vec::new();
        for station in self.hvdc_line(id)?.converter_stations() {
            let station = self.connectable_at(station)?;
            terminals.extend(station.terminals().iter().map(|t| t.id()));
        }
        Ok(terminals)
    }

    /// Connects both converter stations of an HVDC line, or neither.
    pub fn connect_hvdc_line(&mut self, id: &str) -> Result<bool, Error> {
        let terminals = self.hvdc_terminals(id)?;
        self.connect_terminals(&terminals, SwitchPredicate::NonFictitiousBreaker, false)
    }

    /// Disconnects both converter stations of an HVDC line, or neither.
    pub fn disconnect_hvdc_line(&mut self, id: &str) -> Result<bool, Error> {
        let terminals = self.hvdc_terminals(id)?;
        self.disconnect_terminals(&terminals, SwitchPredicate::ClosedBreaker)
    }

    /// Stages the connection of both converter stations of an HVDC line.
    pub fn stage_hvdc_line_connection(
        &self,
        id: &str,
        staged: &mut StagedTopologyChange,
    ) -> Result<bool, Error> {
        let terminals = self.hvdc_terminals(id)?;
        self.stage_connection(
            &terminals,
            SwitchPredicate::NonFictitiousBreaker,
            false,
            staged,
        )
    }

    pub fn stage_hvdc_line_disconnection(
        &self,
        id: &str,
        staged: &mut StagedTopologyChange,
    ) -> Result<bool, Error> {
        let terminals = self.hvdc_terminals(id)?;
        self.stage_disconnection(&terminals, SwitchPredicate::ClosedBreaker, staged)
    }
}
