// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for creating a [`Network`] and adding objects to it.

use std::collections::HashSet;
use std::sync::atomic::AtomicU64;

use indexmap::IndexMap;

use super::{ComponentsVariant, Network};
use crate::{
    arena::Arena,
    equipment::{
        BusSpec, BusbarSectionSpec, ConfiguredBus, Connectable, ConnectableKind, Generator,
        GeneratorSpec, HvdcConverterStation, HvdcConverterStationSpec, HvdcLine, HvdcLineSpec,
        Leg, Line, LineSpec, Load, LoadSpec, RatioTapChanger, Referrer, Side, Substation,
        SubstationSpec, Switch, SwitchEnds, SwitchSpec, Terminal, TerminalKind, TerminalSpec,
        TerminalTarget, ThreeWindingsTransformer, ThreeWindingsTransformerSpec,
        TwoWindingsTransformer, TwoWindingsTransformerSpec, VoltageLevel, VoltageLevelSpec,
    },
    identifiable::{
        ConnectableId, ElementRef, HvdcLineId, SubstationId, TerminalId, VoltageLevelId,
    },
    index::ObjectIndex,
    listener::Listeners,
    topology::{
        BusBreakerTopology, NodeBreakerTopology, TopologyKind, TopologyModel,
    },
    variant::{StateArray, VariantArray, VariantManager},
    Error, Identifiable, IdentifiableType, NetworkConfig,
};

/// `Network` instantiation.
impl Network {
    /// Creates an empty network with the default configuration.
    pub fn new(id: &str) -> Self {
        Self::with_config(id, NetworkConfig::default())
    }

    /// Creates an empty network.
    pub fn with_config(id: &str, config: NetworkConfig) -> Self {
        let variants = VariantManager::new(config.allow_variant_multi_thread_access);
        let size = variants.variant_array_size();
        Self {
            id: id.to_string(),
            config,
            variants,
            index: ObjectIndex::new(),
            substations: Arena::new(),
            voltage_levels: Arena::new(),
            connectables: Arena::new(),
            hvdc_lines: Arena::new(),
            components: StateArray::new(size, ComponentsVariant::default),
            extensions: IndexMap::new(),
            listeners: Listeners::default(),
            properties: Default::default(),
            invalidations: AtomicU64::new(0),
        }
    }

    fn notify_creation(&self, id: &str, kind: IdentifiableType) {
        tracing::debug!("Added {kind} '{id}'");
        self.listeners
            .notify("creation", |l| l.on_creation(id, kind));
    }

    pub fn add_substation(&mut self, spec: SubstationSpec) -> Result<SubstationId, Error> {
        let key = self.substations.next_key();
        self.index.check_and_add(
            &spec.id,
            IdentifiableType::Substation,
            ElementRef::Substation(key),
        )?;
        self.substations
            .insert(Substation::new(spec.id.clone(), spec.name, spec.country));
        self.notify_creation(&spec.id, IdentifiableType::Substation);
        Ok(key)
    }

    pub fn add_voltage_level(&mut self, spec: VoltageLevelSpec) -> Result<VoltageLevelId, Error> {
        self.index
            .check_id(&spec.id, IdentifiableType::VoltageLevel)?;
        spec.validate()?;
        let substation = match &spec.substation {
            Some(id) => Some(self.substation_key(id).map_err(|_| {
                Error::validation(format!(
                    "Voltage level '{}': substation '{id}' not found",
                    spec.id
                ))
            })?),
            None => None,
        };

        let key = self.voltage_levels.next_key();
        let size = self.variants.variant_array_size();
        let topology = match spec.topology_kind {
            TopologyKind::NodeBreaker => TopologyModel::NodeBreaker(NodeBreakerTopology::new(
                key,
                spec.id.clone(),
                self.config.max_node_index,
                size,
            )),
            TopologyKind::BusBreaker => {
                TopologyModel::BusBreaker(BusBreakerTopology::new(key, spec.id.clone(), size))
            }
        };
        self.index.check_and_add(
            &spec.id,
            IdentifiableType::VoltageLevel,
            ElementRef::VoltageLevel(key),
        )?;
        self.voltage_levels.insert(VoltageLevel::new(
            spec.id.clone(),
            spec.name,
            substation,
            spec.nominal_v,
            spec.fictitious,
            topology,
        ));
        self.notify_creation(&spec.id, IdentifiableType::VoltageLevel);
        Ok(key)
    }

    /// Adds a configured bus to a bus-breaker voltage level.
    pub fn add_bus(&mut self, spec: BusSpec) -> Result<(), Error> {
        self.index.check_id(&spec.id, IdentifiableType::Bus)?;
        let vl_key = self.voltage_level_key(&spec.voltage_level)?;
        let size = self.variants.variant_array_size();
        let vl = self.voltage_level_mut(vl_key)?;
        let Some(topology) = vl.topology.as_bus_breaker_mut() else {
            return Err(Error::invalid_topology(format!(
                "Bus '{}': voltage level '{}' has a node/breaker topology",
                spec.id, spec.voltage_level
            )));
        };
        let change = topology.add_bus(ConfiguredBus::new(spec.id.clone(), spec.name, vl_key, size));
        self.index
            .check_and_add(&spec.id, IdentifiableType::Bus, ElementRef::Bus(vl_key))?;
        self.propagate(vl_key, change);
        self.notify_creation(&spec.id, IdentifiableType::Bus);
        Ok(())
    }

    pub fn add_switch(&mut self, spec: SwitchSpec) -> Result<(), Error> {
        self.index.check_id(&spec.id, IdentifiableType::Switch)?;
        let vl_key = self.voltage_level_key(&spec.voltage_level)?;
        let size = self.variants.variant_array_size();
        let switch = Switch::new(
            spec.id.clone(),
            spec.name,
            vl_key,
            spec.kind,
            spec.fictitious,
            spec.open,
            spec.retained,
            size,
        );

        let vl = self.voltage_level_mut(vl_key)?;
        let change = match (&mut vl.topology, &spec.ends) {
            (TopologyModel::NodeBreaker(topology), SwitchEnds::Nodes(node1, node2)) => {
                topology.check_switch(&spec.id, *node1, *node2)?;
                topology.add_switch(switch, *node1, *node2)?
            }
            (TopologyModel::BusBreaker(topology), SwitchEnds::Buses(bus1, bus2)) => {
                if spec.retained {
                    return Err(Error::validation(format!(
                        "Switch '{}': retained switches are not supported in a bus/breaker \
                         topology",
                        spec.id
                    )));
                }
                topology.check_switch(&spec.id, bus1, bus2)?;
                topology.add_switch(switch, bus1, bus2)?
            }
            (topology, _) => {
                return Err(Error::invalid_topology(format!(
                    "Switch '{}': ends do not match the {} topology of voltage level '{}'",
                    spec.id,
                    topology.kind(),
                    spec.voltage_level
                )))
            }
        };
        // the id was checked above, this cannot fail
        self.index.check_and_add(
            &spec.id,
            IdentifiableType::Switch,
            ElementRef::Switch(vl_key),
        )?;
        self.propagate(vl_key, change);
        self.notify_creation(&spec.id, IdentifiableType::Switch);
        Ok(())
    }

    /// Joins two nodes of a node-breaker voltage level with a connection that
    /// is always closed.
    pub fn add_internal_connection(
        &mut self,
        voltage_level: &str,
        node1: usize,
        node2: usize,
    ) -> Result<(), Error> {
        let vl_key = self.voltage_level_key(voltage_level)?;
        let vl = self.voltage_level_mut(vl_key)?;
        let topology = vl.topology.as_node_breaker_mut().ok_or_else(|| {
            Error::invalid_topology(format!(
                "Internal connections are not supported in bus/breaker voltage level \
                 '{voltage_level}'"
            ))
        })?;
        let change = topology.add_internal_connection(node1, node2)?;
        self.propagate(vl_key, change);
        Ok(())
    }

    pub fn add_busbar_section(&mut self, spec: BusbarSectionSpec) -> Result<ConnectableId, Error> {
        let vl_key = self.voltage_level_key(&spec.voltage_level)?;
        if self
            .voltage_level_at(vl_key)?
            .topology
            .as_node_breaker()
            .is_none()
        {
            return Err(Error::invalid_topology(format!(
                "Busbar section '{}': voltage level '{}' has a bus/breaker topology",
                spec.id, spec.voltage_level
            )));
        }
        self.add_connectable(
            &spec.id,
            spec.name,
            IdentifiableType::BusbarSection,
            &[&TerminalSpec::at_node(&spec.voltage_level, spec.node)],
            |_, _| Ok(ConnectableKind::BusbarSection),
        )
    }

    pub fn add_load(&mut self, spec: LoadSpec) -> Result<ConnectableId, Error> {
        spec.validate()?;
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::Load,
            &[&spec.terminal],
            |size, _| {
                Ok(ConnectableKind::Load(Load {
                    p0: VariantArray::new(size, spec.p0),
                    q0: VariantArray::new(size, spec.q0),
                }))
            },
        )
    }

    pub fn add_generator(&mut self, spec: GeneratorSpec) -> Result<ConnectableId, Error> {
        spec.validate()?;
        let own = self.connectables.next_key();
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::Generator,
            &[&spec.terminal],
            |size, _| {
                Ok(ConnectableKind::Generator(Generator {
                    min_p: spec.min_p,
                    max_p: spec.max_p,
                    target_p: VariantArray::new(size, spec.target_p),
                    target_q: VariantArray::new(size, spec.target_q),
                    target_v: VariantArray::new(size, spec.target_v),
                    voltage_regulator_on: VariantArray::new(size, spec.voltage_regulator_on),
                    regulating_terminal: spec
                        .regulating_terminal
                        .unwrap_or_else(|| TerminalId::new(own, 0)),
                }))
            },
        )
    }

    pub fn add_line(&mut self, spec: LineSpec) -> Result<ConnectableId, Error> {
        spec.validate()?;
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::Line,
            &[&spec.terminal1, &spec.terminal2],
            |_, _| {
                Ok(ConnectableKind::Line(Line {
                    r: spec.r,
                    x: spec.x,
                    g1: spec.g1,
                    b1: spec.b1,
                    g2: spec.g2,
                    b2: spec.b2,
                }))
            },
        )
    }

    pub fn add_two_windings_transformer(
        &mut self,
        spec: TwoWindingsTransformerSpec,
    ) -> Result<ConnectableId, Error> {
        spec.validate()?;
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::TwoWindingsTransformer,
            &[&spec.terminal1, &spec.terminal2],
            |size, substation| {
                let ratio_tap_changer = spec.ratio_tap_changer.as_ref().map(|rtc| RatioTapChanger {
                    low_tap_position: rtc.low_tap_position,
                    steps: rtc.steps.clone(),
                    load_tap_changing_capabilities: rtc.load_tap_changing_capabilities,
                    tap_position: VariantArray::new(size, rtc.tap_position),
                    regulating: VariantArray::new(size, rtc.regulating),
                    target_v: VariantArray::new(size, rtc.target_v),
                    regulation_terminal: rtc.regulation_terminal,
                });
                Ok(ConnectableKind::TwoWindingsTransformer(TwoWindingsTransformer {
                    substation: substation?,
                    r: spec.r,
                    x: spec.x,
                    g: spec.g,
                    b: spec.b,
                    rated_u1: spec.rated_u1,
                    rated_u2: spec.rated_u2,
                    ratio_tap_changer,
                }))
            },
        )
    }

    pub fn add_three_windings_transformer(
        &mut self,
        spec: ThreeWindingsTransformerSpec,
    ) -> Result<ConnectableId, Error> {
        spec.validate()?;
        let [leg1, leg2, leg3] = &spec.legs;
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::ThreeWindingsTransformer,
            &[&leg1.terminal, &leg2.terminal, &leg3.terminal],
            |_, substation| {
                let legs = spec.legs.clone().map(|leg| Leg {
                    r: leg.r,
                    x: leg.x,
                    g: leg.g,
                    b: leg.b,
                    rated_u: leg.rated_u,
                });
                Ok(ConnectableKind::ThreeWindingsTransformer(
                    ThreeWindingsTransformer {
                        substation: substation?,
                        rated_u0: spec.rated_u0,
                        legs,
                    },
                ))
            },
        )
    }

    pub fn add_hvdc_converter_station(
        &mut self,
        spec: HvdcConverterStationSpec,
    ) -> Result<ConnectableId, Error> {
        spec.validate()?;
        self.add_connectable(
            &spec.id,
            spec.name.clone(),
            IdentifiableType::HvdcConverterStation,
            &[&spec.terminal],
            |_, _| {
                Ok(ConnectableKind::HvdcConverterStation(HvdcConverterStation {
                    loss_factor: spec.loss_factor,
                }))
            },
        )
    }

    pub fn add_hvdc_line(&mut self, spec: HvdcLineSpec) -> Result<HvdcLineId, Error> {
        self.index.check_id(&spec.id, IdentifiableType::HvdcLine)?;
        spec.validate()?;
        let owner = format!("HVDC line '{}'", spec.id);
        let mut stations = Vec::with_capacity(2);
        for station_id in [&spec.converter_station1, &spec.converter_station2] {
            let station = self.connectable_key(station_id).ok().filter(|cid| {
                self.connectables.get(*cid).map(|c| c.identifiable_type())
                    == Some(IdentifiableType::HvdcConverterStation)
            });
            let Some(station) = station else {
                return Err(Error::validation(format!(
                    "{owner}: converter station '{station_id}' not found"
                )));
            };
            if let Some(line) = self.hvdc_line_of_station(station) {
                return Err(Error::validation(format!(
                    "{owner}: converter station '{station_id}' is already used by HVDC line \
                     '{}'",
                    line.id()
                )));
            }
            stations.push(station);
        }
        if stations[0] == stations[1] {
            return Err(Error::validation(format!(
                "{owner}: both sides use converter station '{}'",
                spec.converter_station1
            )));
        }

        let key = self.hvdc_lines.next_key();
        self.index.check_and_add(
            &spec.id,
            IdentifiableType::HvdcLine,
            ElementRef::HvdcLine(key),
        )?;
        self.hvdc_lines.insert(HvdcLine::new(
            spec.id.clone(),
            spec.name,
            spec.r,
            spec.nominal_v,
            spec.max_p,
            spec.converters_mode,
            spec.active_power_setpoint,
            [stations[0], stations[1]],
            self.variants.variant_array_size(),
        ));
        self.invalidate_all_components();
        self.notify_creation(&spec.id, IdentifiableType::HvdcLine);
        Ok(key)
    }

    /// Adds a connectable with one terminal per spec in `terminals`.
    ///
    /// All terminal specs are checked against the topologies they target
    /// before anything is changed.  `build` receives the variant array size
    /// and the substation shared by all the terminals, or an error if they
    /// are in different substations.
    fn add_connectable(
        &mut self,
        id: &str,
        name: Option<String>,
        kind: IdentifiableType,
        terminals: &[&TerminalSpec],
        build: impl FnOnce(
            usize,
            Result<Option<SubstationId>, Error>,
        ) -> Result<ConnectableKind, Error>,
    ) -> Result<ConnectableId, Error> {
        self.index.check_id(id, kind)?;
        let owner = format!("{kind} '{id}'");
        let cid = self.connectables.next_key();
        let size = self.variants.variant_array_size();

        let mut resolved = Vec::with_capacity(terminals.len());
        let mut used_nodes = HashSet::new();
        let mut substations = HashSet::new();
        for (position, spec) in terminals.iter().enumerate() {
            let vl_key = self.voltage_level_key(&spec.voltage_level).map_err(|_| {
                Error::validation(format!(
                    "{owner}: voltage level '{}' not found",
                    spec.voltage_level
                ))
            })?;
            let vl = self.voltage_level_at(vl_key)?;
            substations.insert(vl.substation());
            let target = spec.target(&owner)?;
            let terminal_kind = match (&vl.topology, target) {
                (TopologyModel::NodeBreaker(topology), TerminalTarget::Node(node)) => {
                    topology.check_attach(&owner, node)?;
                    if !used_nodes.insert((vl_key, node)) {
                        return Err(Error::validation(format!(
                            "{owner}: two terminals on node {node} of voltage level '{}'",
                            spec.voltage_level
                        )));
                    }
                    TerminalKind::Node { node }
                }
                (TopologyModel::BusBreaker(topology), TerminalTarget::Bus { bus, connected }) => {
                    topology.check_attach(&owner, &bus)?;
                    TerminalKind::Bus {
                        connectable_bus: VariantArray::new(size, bus),
                        connected: VariantArray::new(size, connected),
                    }
                }
                (topology, _) => {
                    return Err(Error::validation(format!(
                        "{owner}: terminal does not match the {} topology of voltage level '{}'",
                        topology.kind(),
                        spec.voltage_level
                    )))
                }
            };
            let side = (terminals.len() > 1).then(|| Side::from_position(position));
            resolved.push(Terminal::new(
                TerminalId::new(cid, position),
                vl_key,
                side,
                terminal_kind,
                size,
            ));
        }

        let substation = if substations.len() > 1 {
            Err(Error::validation(format!(
                "{owner}: the terminals are in different substations"
            )))
        } else {
            Ok(substations.into_iter().next().flatten())
        };
        let connectable =
            Connectable::new(id.to_string(), name, resolved, build(size, substation)?);
        for (terminal, _) in connectable.referenced_terminals(cid) {
            if self.terminal(terminal).is_err() {
                return Err(Error::validation(format!(
                    "{owner}: regulating terminal {terminal:?} not found"
                )));
            }
        }

        self.index
            .check_and_add(id, kind, ElementRef::Connectable(cid))?;
        let attachments = connectable
            .terminals()
            .iter()
            .map(|t| {
                (
                    t.id(),
                    t.voltage_level(),
                    t.node(),
                    t.connectable_bus(0).map(str::to_string),
                )
            })
            .collect::<Vec<_>>();
        self.connectables.insert(connectable);

        for (terminal, vl_key, node, bus) in attachments {
            let vl = self.voltage_level_mut(vl_key)?;
            let change = match (&mut vl.topology, node, bus) {
                (TopologyModel::NodeBreaker(topology), Some(node), _) => {
                    topology.attach(terminal, node)?
                }
                (TopologyModel::BusBreaker(topology), _, Some(bus)) => {
                    topology.attach(terminal, &bus)?
                }
                _ => {
                    return Err(Error::internal(format!(
                        "{owner}: terminal {terminal:?} lost its attachment"
                    )))
                }
            };
            self.propagate(vl_key, change);
        }
        self.register_referrers(cid);
        self.notify_creation(id, kind);
        Ok(cid)
    }

    /// Registers the connectable as referrer of the remote terminals it
    /// refers to.
    pub(super) fn register_referrers(&mut self, cid: ConnectableId) {
        let referenced = self
            .connectables
            .get(cid)
            .map(|c| c.referenced_terminals(cid))
            .unwrap_or_default();
        for (terminal, role) in referenced {
            if let Ok(terminal) = self.terminal_mut(terminal) {
                terminal.add_referrer(Referrer {
                    connectable: cid,
                    role,
                });
            }
        }
    }

    /// Unregisters the connectable from the remote terminals it refers to.
    pub(super) fn unregister_referrers(&mut self, cid: ConnectableId) {
        let referenced = self
            .connectables
            .get(cid)
            .map(|c| c.referenced_terminals(cid))
            .unwrap_or_default();
        for (terminal, role) in referenced {
            if let Ok(terminal) = self.terminal_mut(terminal) {
                terminal.remove_referrer(&Referrer {
                    connectable: cid,
                    role,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::test_utils::{load_spec, NetworkBuilder};
    use crate::SwitchKind;

    #[test]
    fn test_id_uniqueness() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .node_breaker_level("VL")
            .busbar_section("VL", "BBS", 0)
            .build();

        network.add_load(load_spec("L1", TerminalSpec::at_node("VL", 1)))?;
        assert_eq!(
            network.add_load(load_spec("L1", TerminalSpec::at_node("VL", 2))),
            Err(Error::duplicate_id(
                "The network already contains an object 'L1' of type Load"
            ))
        );
        assert_eq!(
            network
                .add_switch(SwitchSpec::between_nodes(
                    "VL",
                    "VL",
                    SwitchKind::Breaker,
                    1,
                    2
                ))
                .map(|_| ()),
            Err(Error::duplicate_id(
                "The network already contains an object 'VL' of type VoltageLevel"
            ))
        );
        // the rejected load left nothing behind
        assert!(network.node_breaker_view("VL")?.terminal(2).is_none());

        network.remove_connectable("L1")?;
        network.add_load(load_spec("L1", TerminalSpec::at_node("VL", 2)))?;
        assert!(network.node_breaker_view("VL")?.terminal(1).is_none());
        assert!(network.node_breaker_view("VL")?.terminal(2).is_some());
        Ok(())
    }

    #[test]
    fn test_terminal_validation() {
        let mut network = NetworkBuilder::new()
            .node_breaker_level("NB")
            .bus_breaker_level("BB")
            .bus("BB", "B1")
            .busbar_section("NB", "BBS", 0)
            .build();

        assert_eq!(
            network.add_load(load_spec("L", TerminalSpec::at_bus("NB", "B1"))),
            Err(Error::validation(
                "Load 'L': terminal does not match the node/breaker topology of voltage level 'NB'"
            ))
        );
        assert_eq!(
            network.add_load(load_spec("L", TerminalSpec::at_bus("BB", "B2"))),
            Err(Error::validation(
                "Load 'L': bus 'B2' not found in voltage level 'BB'"
            ))
        );
        assert_eq!(
            network.add_load(load_spec("L", TerminalSpec::at_node("NB", 0))),
            Err(Error::validation(
                "Load 'L': an equipment is already connected to node 0 of voltage level 'NB'"
            ))
        );
        assert_eq!(
            network.add_load(load_spec("L", TerminalSpec::at_node("XX", 0))),
            Err(Error::validation("Load 'L': voltage level 'XX' not found"))
        );

        // a line with both ends on the same node is rejected as a whole
        let line = LineSpec {
            id: "LINE".into(),
            terminal1: TerminalSpec::at_node("NB", 5),
            terminal2: TerminalSpec::at_node("NB", 5),
            x: 1.0,
            ..Default::default()
        };
        assert_eq!(
            network.add_line(line),
            Err(Error::validation(
                "Line 'LINE': two terminals on node 5 of voltage level 'NB'"
            ))
        );
        let view = network.node_breaker_view("NB").unwrap();
        assert!(view.terminal(5).is_none());
        assert!(!network.contains("LINE"));
    }

    #[test]
    fn test_transformer_substation() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .substation("S1")
            .substation("S2")
            .bus_breaker_level_in("VL1", "S1")
            .bus_breaker_level_in("VL2", "S1")
            .bus_breaker_level_in("VL3", "S2")
            .bus("VL1", "B1")
            .bus("VL2", "B2")
            .bus("VL3", "B3")
            .build();

        let spec = |id: &str, vl: &str, bus: &str| TwoWindingsTransformerSpec {
            id: id.into(),
            terminal1: TerminalSpec::at_bus("VL1", "B1"),
            terminal2: TerminalSpec::at_bus(vl, bus),
            x: 10.0,
            rated_u1: 400.0,
            rated_u2: 225.0,
            ..Default::default()
        };
        assert_eq!(
            network.add_two_windings_transformer(spec("T13", "VL3", "B3")),
            Err(Error::validation(
                "TwoWindingsTransformer 'T13': the terminals are in different substations"
            ))
        );
        network.add_two_windings_transformer(spec("T12", "VL2", "B2"))?;
        let transformer = network.two_windings_transformer("T12")?;
        assert_eq!(
            transformer.substation(),
            Some(network.substation_key("S1")?),
        );
        assert!(transformer.ratio_tap_changer().is_none());
        Ok(())
    }

    #[test]
    fn test_hvdc_line_creation() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL1")
            .bus_breaker_level("VL2")
            .bus("VL1", "B1")
            .bus("VL2", "B2")
            .converter_station("CS1", TerminalSpec::at_bus("VL1", "B1"))
            .converter_station("CS2", TerminalSpec::at_bus("VL2", "B2"))
            .build();

        let spec = HvdcLineSpec {
            id: "HVDC".into(),
            r: 1.0,
            nominal_v: 400.0,
            max_p: 300.0,
            active_power_setpoint: 280.0,
            converter_station1: "CS1".into(),
            converter_station2: "CS3".into(),
            ..Default::default()
        };
        assert_eq!(
            network.add_hvdc_line(spec.clone()),
            Err(Error::validation(
                "HVDC line 'HVDC': converter station 'CS3' not found"
            ))
        );
        network.add_hvdc_line(HvdcLineSpec {
            converter_station2: "CS2".into(),
            ..spec.clone()
        })?;
        assert_eq!(
            network.add_hvdc_line(HvdcLineSpec {
                id: "HVDC2".into(),
                converter_station2: "CS2".into(),
                ..spec
            }),
            Err(Error::validation(
                "HVDC line 'HVDC2': converter station 'CS1' is already used by HVDC line 'HVDC'"
            ))
        );
        let line = network.hvdc_line("HVDC")?;
        assert_eq!(line.active_power_setpoint(0), 280.0);
        Ok(())
    }

    #[test]
    fn test_switch_creation_checks_topology() {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("BB")
            .bus("BB", "B1")
            .bus("BB", "B2")
            .build();
        assert_eq!(
            network.add_switch(SwitchSpec::between_nodes(
                "S",
                "BB",
                SwitchKind::Breaker,
                0,
                1
            )),
            Err(Error::invalid_topology(
                "Switch 'S': ends do not match the bus/breaker topology of voltage level 'BB'"
            ))
        );
        assert_eq!(
            network.add_switch(SwitchSpec::between_buses("S", "BB", "B1", "B1")),
            Err(Error::validation("Switch 'S': both ends are on bus 'B1'"))
        );
        assert_eq!(
            network.add_internal_connection("BB", 0, 1),
            Err(Error::invalid_topology(
                "Internal connections are not supported in bus/breaker voltage level 'BB'"
            ))
        );
        assert!(network
            .add_switch(SwitchSpec::between_buses("S", "BB", "B1", "B2"))
            .is_ok());
        assert_eq!(network.switch("S").map(|s| s.kind()), Ok(SwitchKind::Breaker));
    }
}
