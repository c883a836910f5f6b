// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for removing objects from a [`Network`].

use tracing::{debug, trace};

use super::Network;
use crate::{
    equipment::{Referrer, TerminalKind},
    identifiable::{ElementRef, TerminalId, VoltageLevelId},
    topology::GraphChange,
    Error, Identifiable, IdentifiableType,
};

/// Where a terminal sits in the topology of its voltage level.
enum Attachment {
    Node(usize),
    Buses(Vec<String>),
}

impl Network {
    fn notify_before_removal(&self, id: &str, kind: IdentifiableType) {
        self.listeners
            .notify("removal", |l| l.before_removal(id, kind));
    }

    fn notify_after_removal(&self, id: &str) {
        self.listeners.notify("removal", |l| l.after_removal(id));
        debug!("Removed '{id}' from network '{}'", self.id);
    }

    /// Removes a connectable, detaching its terminals from their voltage
    /// levels.
    ///
    /// Equipment regulating one of its terminals falls back to local
    /// regulation.  A converter station used by an HVDC line cannot be
    /// removed.
    pub fn remove_connectable(&mut self, id: &str) -> Result<(), Error> {
        let key = self.connectable_key(id)?;
        if let Some(line) = self.hvdc_line_of_station(key) {
            return Err(Error::validation(format!(
                "Cannot remove converter station '{id}' used by HVDC line '{}'",
                line.id()
            )));
        }
        let connectable = self.connectable_at(key)?;
        let kind = connectable.identifiable_type();
        trace!("Removing {kind} '{}'", connectable.name_or_id());
        let mut attachments: Vec<(TerminalId, VoltageLevelId, Attachment)> = Vec::new();
        let mut referrers: Vec<Referrer> = Vec::new();
        for terminal in connectable.terminals() {
            let attachment = match terminal.kind() {
                TerminalKind::Node { node } => Attachment::Node(*node),
                TerminalKind::Bus { .. } => Attachment::Buses(
                    terminal
                        .all_connectable_buses()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                ),
            };
            attachments.push((terminal.id(), terminal.voltage_level(), attachment));
            referrers.extend(
                terminal
                    .referrers()
                    .iter()
                    .filter(|r| r.connectable != key)
                    .copied(),
            );
        }

        self.notify_before_removal(id, kind);
        self.index.remove(id, &ElementRef::Connectable(key))?;

        for (terminal, vl_key, attachment) in attachments {
            let topology = &mut self.voltage_level_mut(vl_key)?.topology;
            let change = match attachment {
                Attachment::Node(node) => topology
                    .as_node_breaker_mut()
                    .map(|t| t.detach(terminal, node))
                    .transpose()?
                    .unwrap_or(GraphChange::Unchanged),
                Attachment::Buses(buses) => {
                    let buses = buses.iter().map(String::as_str).collect::<Vec<_>>();
                    topology
                        .as_bus_breaker_mut()
                        .map(|t| t.detach(terminal, &buses))
                        .unwrap_or(GraphChange::Unchanged)
                }
            };
            self.propagate(vl_key, change);
        }

        self.unregister_referrers(key);
        for referrer in referrers {
            if let Some(connectable) = self.connectables.get_mut(referrer.connectable) {
                connectable.on_referenced_removal(referrer.connectable, referrer.role);
            }
        }
        self.connectables.remove(key);
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }

    /// Removes a switch from its voltage level.
    pub fn remove_switch(&mut self, id: &str) -> Result<(), Error> {
        let Some(ElementRef::Switch(vl_key)) = self.index.get(id).cloned() else {
            return Err(Error::element_not_found(format!("Switch '{id}' not found")));
        };
        if self.voltage_level_at(vl_key)?.topology.switch(id).is_none() {
            return Err(Error::internal(format!("Switch '{id}' is indexed but missing")));
        }
        self.notify_before_removal(id, IdentifiableType::Switch);
        let (_, change) = self.voltage_level_mut(vl_key)?.topology.remove_switch(id)?;
        self.propagate(vl_key, change);
        self.index.remove(id, &ElementRef::Switch(vl_key))?;
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }

    /// Removes a configured bus, which must have no terminal and no switch
    /// left.
    pub fn remove_bus(&mut self, id: &str) -> Result<(), Error> {
        let Some(ElementRef::Bus(vl_key)) = self.index.get(id).cloned() else {
            return Err(Error::element_not_found(format!("Bus '{id}' not found")));
        };
        let missing = || Error::internal(format!("Bus '{id}' is in a node/breaker voltage level"));
        self.voltage_level_at(vl_key)?
            .topology
            .as_bus_breaker()
            .ok_or_else(missing)?
            .check_bus_removal(id)?;
        self.notify_before_removal(id, IdentifiableType::Bus);
        let (_, change) = self
            .voltage_level_mut(vl_key)?
            .topology
            .as_bus_breaker_mut()
            .ok_or_else(missing)?
            .remove_bus(id)?;
        self.propagate(vl_key, change);
        self.index.remove(id, &ElementRef::Bus(vl_key))?;
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }

    pub fn remove_hvdc_line(&mut self, id: &str) -> Result<(), Error> {
        let key = self.hvdc_line_key(id)?;
        self.notify_before_removal(id, IdentifiableType::HvdcLine);
        self.index.remove(id, &ElementRef::HvdcLine(key))?;
        self.hvdc_lines.remove(key);
        self.invalidate_all_components();
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }

    /// Removes a voltage level with its switches and configured buses.  It
    /// must not hold any connectable.
    pub fn remove_voltage_level(&mut self, id: &str) -> Result<(), Error> {
        let key = self.voltage_level_key(id)?;
        if let Some(connectable) = self.connectables_in(key).next() {
            return Err(Error::validation(format!(
                "Cannot remove voltage level '{id}' because of connectable '{}'",
                connectable.id()
            )));
        }
        let vl = self.voltage_level_at(key)?;
        let switches = vl
            .topology
            .switches()
            .into_iter()
            .map(|s| s.id().to_string())
            .collect::<Vec<_>>();
        let buses = vl
            .topology
            .as_bus_breaker()
            .map(|t| t.buses().map(|b| b.id().to_string()).collect::<Vec<_>>())
            .unwrap_or_default();

        self.notify_before_removal(id, IdentifiableType::VoltageLevel);
        for switch in &switches {
            self.index.remove(switch, &ElementRef::Switch(key))?;
            self.properties.remove(switch);
        }
        for bus in &buses {
            self.index.remove(bus, &ElementRef::Bus(key))?;
            self.properties.remove(bus);
        }
        self.index.remove(id, &ElementRef::VoltageLevel(key))?;
        self.voltage_levels.remove(key);
        self.invalidate_all_components();
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }

    /// Removes a substation, which must not hold any voltage level.
    pub fn remove_substation(&mut self, id: &str) -> Result<(), Error> {
        let key = self.substation_key(id)?;
        if let Some(vl) = self.voltage_levels_of(key).next() {
            return Err(Error::validation(format!(
                "Cannot remove substation '{id}' because of voltage level '{}'",
                vl.id()
            )));
        }
        self.notify_before_removal(id, IdentifiableType::Substation);
        self.index.remove(id, &ElementRef::Substation(key))?;
        self.substations.remove(key);
        self.properties.remove(id);
        self.notify_after_removal(id);
        Ok(())
    }
}
