// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for retrieving objects from a [`Network`].

use super::Network;
use crate::{
    equipment::{
        ConfiguredBus, Connectable, ConnectableKind, Generator, HvdcLine, Line, Load, Substation,
        Switch, Terminal, ThreeWindingsTransformer, TwoWindingsTransformer, VoltageLevel,
    },
    identifiable::{
        ConnectableId, ElementRef, HvdcLineId, SubstationId, TerminalId, VoltageLevelId,
    },
    Error, Identifiable, IdentifiableType,
};

/// `Network` methods for retrieving objects by id or by handle.
impl Network {
    /// Returns the id of the network.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns whether an object with the given id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Returns the type of the object with the given id.
    pub fn identifiable_type(&self, id: &str) -> Result<IdentifiableType, Error> {
        self.index
            .kind(id)
            .ok_or_else(|| Error::element_not_found(format!("Object '{id}' not found")))
    }

    /// Returns the object with the given id, whatever its type.
    pub fn identifiable(&self, id: &str) -> Result<&dyn Identifiable, Error> {
        let element = self
            .index
            .get(id)
            .ok_or_else(|| Error::element_not_found(format!("Object '{id}' not found")))?;
        let found: Option<&dyn Identifiable> = match element {
            ElementRef::Substation(key) => {
                self.substations.get(*key).map(|s| s as &dyn Identifiable)
            }
            ElementRef::VoltageLevel(key) => self
                .voltage_levels
                .get(*key)
                .map(|vl| vl as &dyn Identifiable),
            ElementRef::Bus(key) => self
                .voltage_levels
                .get(*key)
                .and_then(|vl| vl.topology.as_bus_breaker())
                .and_then(|t| t.bus(id))
                .map(|b| b as &dyn Identifiable),
            ElementRef::Switch(key) => self
                .voltage_levels
                .get(*key)
                .and_then(|vl| vl.topology.switch(id))
                .map(|s| s as &dyn Identifiable),
            ElementRef::Connectable(key) => {
                self.connectables.get(*key).map(|c| c as &dyn Identifiable)
            }
            ElementRef::HvdcLine(key) => self.hvdc_lines.get(*key).map(|l| l as &dyn Identifiable),
        };
        found.ok_or_else(|| {
            Error::internal(format!("Object '{id}' is indexed at {element:?} but missing"))
        })
    }

    /// Returns the ids of the objects of exactly the given type, in creation
    /// order.
    pub fn ids(&self, kind: IdentifiableType) -> impl Iterator<Item = &str> {
        self.index.get_all(kind)
    }

    /// Returns the number of objects in the network.
    pub fn object_count(&self) -> usize {
        self.index.len()
    }

    fn element(&self, id: &str, kind: &str) -> Result<&ElementRef, Error> {
        self.index
            .get(id)
            .ok_or_else(|| Error::element_not_found(format!("{kind} '{id}' not found")))
    }

    pub fn substation_key(&self, id: &str) -> Result<SubstationId, Error> {
        match self.element(id, "Substation")? {
            ElementRef::Substation(key) => Ok(*key),
            _ => Err(Error::element_not_found(format!("Substation '{id}' not found"))),
        }
    }

    pub fn voltage_level_key(&self, id: &str) -> Result<VoltageLevelId, Error> {
        match self.element(id, "Voltage level")? {
            ElementRef::VoltageLevel(key) => Ok(*key),
            _ => Err(Error::element_not_found(format!("Voltage level '{id}' not found"))),
        }
    }

    pub fn connectable_key(&self, id: &str) -> Result<ConnectableId, Error> {
        match self.element(id, "Connectable")? {
            ElementRef::Connectable(key) => Ok(*key),
            _ => Err(Error::element_not_found(format!("Connectable '{id}' not found"))),
        }
    }

    pub fn hvdc_line_key(&self, id: &str) -> Result<HvdcLineId, Error> {
        match self.element(id, "HVDC line")? {
            ElementRef::HvdcLine(key) => Ok(*key),
            _ => Err(Error::element_not_found(format!("HVDC line '{id}' not found"))),
        }
    }

    pub fn substation(&self, id: &str) -> Result<&Substation, Error> {
        let key = self.substation_key(id)?;
        self.substations
            .get(key)
            .ok_or_else(|| Error::internal(format!("Substation '{id}' is indexed but missing")))
    }

    pub fn voltage_level(&self, id: &str) -> Result<&VoltageLevel, Error> {
        self.voltage_level_at(self.voltage_level_key(id)?)
    }

    pub fn voltage_level_at(&self, key: VoltageLevelId) -> Result<&VoltageLevel, Error> {
        self.voltage_levels
            .get(key)
            .ok_or_else(|| Error::element_not_found(format!("Voltage level {key:?} not found")))
    }

    pub(super) fn voltage_level_mut(
        &mut self,
        key: VoltageLevelId,
    ) -> Result<&mut VoltageLevel, Error> {
        self.voltage_levels
            .get_mut(key)
            .ok_or_else(|| Error::element_not_found(format!("Voltage level {key:?} not found")))
    }

    pub fn connectable(&self, id: &str) -> Result<&Connectable, Error> {
        self.connectable_at(self.connectable_key(id)?)
    }

    pub fn connectable_at(&self, key: ConnectableId) -> Result<&Connectable, Error> {
        self.connectables
            .get(key)
            .ok_or_else(|| Error::element_not_found(format!("Connectable {key:?} not found")))
    }

    pub fn hvdc_line(&self, id: &str) -> Result<&HvdcLine, Error> {
        let key = self.hvdc_line_key(id)?;
        self.hvdc_lines
            .get(key)
            .ok_or_else(|| Error::internal(format!("HVDC line '{id}' is indexed but missing")))
    }

    /// Returns the HVDC line using the given converter station, if any.
    pub fn hvdc_line_of_station(&self, station: ConnectableId) -> Option<&HvdcLine> {
        self.hvdc_lines
            .iter()
            .map(|(_, line)| line)
            .find(|line| line.converter_stations().contains(&station))
    }

    pub fn terminal(&self, id: TerminalId) -> Result<&Terminal, Error> {
        self.connectables
            .get(id.connectable())
            .and_then(|c| c.terminal_at(id.position()))
            .ok_or_else(|| Error::element_not_found(format!("Terminal {id:?} not found")))
    }

    pub fn switch(&self, id: &str) -> Result<&Switch, Error> {
        match self.element(id, "Switch")? {
            ElementRef::Switch(key) => self
                .voltage_level_at(*key)?
                .topology
                .switch(id)
                .ok_or_else(|| Error::internal(format!("Switch '{id}' is indexed but missing"))),
            _ => Err(Error::element_not_found(format!("Switch '{id}' not found"))),
        }
    }

    /// Returns a configured bus of a bus-breaker voltage level.
    pub fn configured_bus(&self, id: &str) -> Result<&ConfiguredBus, Error> {
        match self.element(id, "Bus")? {
            ElementRef::Bus(key) => self
                .voltage_level_at(*key)?
                .topology
                .as_bus_breaker()
                .and_then(|t| t.bus(id))
                .ok_or_else(|| Error::internal(format!("Bus '{id}' is indexed but missing"))),
            _ => Err(Error::element_not_found(format!("Bus '{id}' not found"))),
        }
    }

    fn connectable_kind(
        &self,
        id: &str,
        kind: IdentifiableType,
    ) -> Result<&ConnectableKind, Error> {
        let connectable = self.connectable(id)?;
        if connectable.identifiable_type() != kind {
            return Err(Error::element_not_found(format!("{kind} '{id}' not found")));
        }
        Ok(connectable.kind())
    }

    pub fn load(&self, id: &str) -> Result<&Load, Error> {
        match self.connectable_kind(id, IdentifiableType::Load)? {
            ConnectableKind::Load(load) => Ok(load),
            _ => Err(Error::element_not_found(format!("Load '{id}' not found"))),
        }
    }

    pub fn generator(&self, id: &str) -> Result<&Generator, Error> {
        match self.connectable_kind(id, IdentifiableType::Generator)? {
            ConnectableKind::Generator(generator) => Ok(generator),
            _ => Err(Error::element_not_found(format!("Generator '{id}' not found"))),
        }
    }

    pub fn line(&self, id: &str) -> Result<&Line, Error> {
        match self.connectable_kind(id, IdentifiableType::Line)? {
            ConnectableKind::Line(line) => Ok(line),
            _ => Err(Error::element_not_found(format!("Line '{id}' not found"))),
        }
    }

    pub fn two_windings_transformer(&self, id: &str) -> Result<&TwoWindingsTransformer, Error> {
        match self.connectable_kind(id, IdentifiableType::TwoWindingsTransformer)? {
            ConnectableKind::TwoWindingsTransformer(transformer) => Ok(transformer),
            _ => Err(Error::element_not_found(format!(
                "TwoWindingsTransformer '{id}' not found"
            ))),
        }
    }

    pub fn three_windings_transformer(&self, id: &str) -> Result<&ThreeWindingsTransformer, Error> {
        match self.connectable_kind(id, IdentifiableType::ThreeWindingsTransformer)? {
            ConnectableKind::ThreeWindingsTransformer(transformer) => Ok(transformer),
            _ => Err(Error::element_not_found(format!(
                "ThreeWindingsTransformer '{id}' not found"
            ))),
        }
    }

    /// Returns the connectables with a terminal in the given voltage level.
    pub fn connectables_in(
        &self,
        voltage_level: VoltageLevelId,
    ) -> impl Iterator<Item = &Connectable> {
        self.connectables.iter().filter_map(move |(_, c)| {
            c.terminals()
                .iter()
                .any(|t| t.voltage_level() == voltage_level)
                .then_some(c)
        })
    }

    /// Returns the voltage levels of a substation.
    pub fn voltage_levels_of(
        &self,
        substation: SubstationId,
    ) -> impl Iterator<Item = &VoltageLevel> {
        self.voltage_levels
            .iter()
            .filter_map(move |(_, vl)| (vl.substation() == Some(substation)).then_some(vl))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        equipment::TerminalSpec,
        network::test_utils::NetworkBuilder,
        Error, Identifiable, IdentifiableType,
    };

    #[test]
    fn test_lookups() -> Result<(), Error> {
        let network = NetworkBuilder::new()
            .substation("S")
            .bus_breaker_level_in("VL", "S")
            .bus("VL", "B1")
            .load("L1", TerminalSpec::at_bus("VL", "B1"))
            .load("L2", TerminalSpec::at_bus("VL", "B1"))
            .build();

        assert_eq!(network.identifiable_type("L1")?, IdentifiableType::Load);
        assert_eq!(
            network.identifiable("B1")?.identifiable_type(),
            IdentifiableType::Bus,
        );
        assert_eq!(
            network.ids(IdentifiableType::Load).collect::<Vec<_>>(),
            vec!["L1", "L2"]
        );
        assert_eq!(network.object_count(), 5);
        assert_eq!(network.configured_bus("B1")?.terminals(0).len(), 2);

        assert_eq!(
            network.generator("L1").map(|_| ()),
            Err(Error::element_not_found("Generator 'L1' not found"))
        );
        assert_eq!(
            network.voltage_level("L1").map(|_| ()),
            Err(Error::element_not_found("Voltage level 'L1' not found"))
        );
        assert_eq!(
            network.identifiable("X").map(|_| ()),
            Err(Error::element_not_found("Object 'X' not found"))
        );

        let vl = network.voltage_level_key("VL")?;
        assert_eq!(network.connectables_in(vl).count(), 2);
        let substation = network.substation_key("S")?;
        assert_eq!(
            network
                .voltage_levels_of(substation)
                .map(|vl| vl.id())
                .collect::<Vec<_>>(),
            vec!["VL"]
        );
        Ok(())
    }
}
