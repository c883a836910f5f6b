// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module is only compiled when running unit tests and contains features
//! that are shared by all tests of the `network` module.
//!
//! - the `NetworkBuilder`, which can declaratively build the fixture networks
//!   used in tests.
//! - spec shorthands for the equipment tests add by hand.
//! - `init_logging`, which routes the library's tracing output to the test
//!   harness.

use crate::{
    equipment::{
        BusSpec, BusbarSectionSpec, HvdcConverterStationSpec, HvdcLineSpec, LineSpec, LoadSpec,
        SubstationSpec, SwitchSpec, TerminalSpec, VoltageLevelSpec,
    },
    Network, SwitchKind, TopologyKind,
};

/// Installs a subscriber printing the library logs through the test writer,
/// filtered by `RUST_LOG`.  Only the first call in a test binary has an
/// effect.
pub(super) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns a load spec with zero setpoints.
pub(super) fn load_spec(id: &str, terminal: TerminalSpec) -> LoadSpec {
    LoadSpec {
        id: id.to_string(),
        terminal,
        ..Default::default()
    }
}

/// Returns a line spec with a small reactance.
pub(super) fn line_spec(id: &str, terminal1: TerminalSpec, terminal2: TerminalSpec) -> LineSpec {
    LineSpec {
        id: id.to_string(),
        terminal1,
        terminal2,
        r: 0.1,
        x: 1.0,
        ..Default::default()
    }
}

/// A builder for creating test networks easily.
///
/// Every step is applied right away, and panics if the network rejects it.
pub(super) struct NetworkBuilder {
    network: Network,
}

impl NetworkBuilder {
    /// Creates a new `NetworkBuilder` around an empty network.
    pub(super) fn new() -> Self {
        NetworkBuilder {
            network: Network::new("test"),
        }
    }

    pub(super) fn substation(&mut self, id: &str) -> &mut Self {
        self.network
            .add_substation(SubstationSpec {
                id: id.to_string(),
                ..Default::default()
            })
            .unwrap();
        self
    }

    fn voltage_level(&mut self, spec: VoltageLevelSpec) -> &mut Self {
        self.network
            .add_voltage_level(VoltageLevelSpec {
                nominal_v: 400.0,
                ..spec
            })
            .unwrap();
        self
    }

    /// Adds a node-breaker voltage level at 400 kV, outside any substation.
    pub(super) fn node_breaker_level(&mut self, id: &str) -> &mut Self {
        self.voltage_level(VoltageLevelSpec {
            id: id.to_string(),
            topology_kind: TopologyKind::NodeBreaker,
            ..Default::default()
        })
    }

    pub(super) fn fictitious_node_breaker_level(&mut self, id: &str) -> &mut Self {
        self.voltage_level(VoltageLevelSpec {
            id: id.to_string(),
            topology_kind: TopologyKind::NodeBreaker,
            fictitious: true,
            ..Default::default()
        })
    }

    /// Adds a bus-breaker voltage level at 400 kV, outside any substation.
    pub(super) fn bus_breaker_level(&mut self, id: &str) -> &mut Self {
        self.voltage_level(VoltageLevelSpec {
            id: id.to_string(),
            topology_kind: TopologyKind::BusBreaker,
            ..Default::default()
        })
    }

    pub(super) fn bus_breaker_level_in(&mut self, id: &str, substation: &str) -> &mut Self {
        self.voltage_level(VoltageLevelSpec {
            id: id.to_string(),
            substation: Some(substation.to_string()),
            topology_kind: TopologyKind::BusBreaker,
            ..Default::default()
        })
    }

    /// Adds a configured bus to a bus-breaker voltage level.
    pub(super) fn bus(&mut self, voltage_level: &str, id: &str) -> &mut Self {
        self.network
            .add_bus(BusSpec {
                id: id.to_string(),
                name: None,
                voltage_level: voltage_level.to_string(),
            })
            .unwrap();
        self
    }

    pub(super) fn busbar_section(
        &mut self,
        voltage_level: &str,
        id: &str,
        node: usize,
    ) -> &mut Self {
        self.network
            .add_busbar_section(BusbarSectionSpec {
                id: id.to_string(),
                name: None,
                voltage_level: voltage_level.to_string(),
                node,
            })
            .unwrap();
        self
    }

    /// Adds a switch between two nodes of a node-breaker voltage level.
    pub(super) fn switch(
        &mut self,
        voltage_level: &str,
        id: &str,
        kind: SwitchKind,
        nodes: (usize, usize),
        open: bool,
    ) -> &mut Self {
        self.network
            .add_switch(
                SwitchSpec::between_nodes(id, voltage_level, kind, nodes.0, nodes.1)
                    .with_open(open),
            )
            .unwrap();
        self
    }

    pub(super) fn load(&mut self, id: &str, terminal: TerminalSpec) -> &mut Self {
        self.network.add_load(load_spec(id, terminal)).unwrap();
        self
    }

    pub(super) fn line(
        &mut self,
        id: &str,
        terminal1: TerminalSpec,
        terminal2: TerminalSpec,
    ) -> &mut Self {
        self.network
            .add_line(line_spec(id, terminal1, terminal2))
            .unwrap();
        self
    }

    pub(super) fn converter_station(&mut self, id: &str, terminal: TerminalSpec) -> &mut Self {
        self.network
            .add_hvdc_converter_station(HvdcConverterStationSpec {
                id: id.to_string(),
                name: None,
                terminal,
                loss_factor: 1.0,
            })
            .unwrap();
        self
    }

    pub(super) fn hvdc_line(&mut self, id: &str, station1: &str, station2: &str) -> &mut Self {
        self.network
            .add_hvdc_line(HvdcLineSpec {
                id: id.to_string(),
                r: 1.0,
                nominal_v: 400.0,
                max_p: 300.0,
                active_power_setpoint: 100.0,
                converter_station1: station1.to_string(),
                converter_station2: station2.to_string(),
                ..Default::default()
            })
            .unwrap();
        self
    }

    /// Returns the network built so far, leaving an empty one behind.
    pub(super) fn build(&mut self) -> Network {
        std::mem::replace(&mut self.network, Network::new("test"))
    }
}
