// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Plain descriptions of the objects to add to a network, and their
//! validation.
//!
//! A spec is checked in full before anything is added, so that a rejected
//! spec leaves the network untouched.

use super::{ConvertersMode, RatioTapChangerStep, SwitchKind};
use crate::{identifiable::TerminalId, topology::TopologyKind, Error};

pub(crate) fn check_finite(owner: &str, attribute: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{owner}: {attribute} is invalid ({value})"
        )))
    }
}

pub(crate) fn check_positive(owner: &str, attribute: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{owner}: {attribute} must be strictly positive ({value})"
        )))
    }
}

pub(crate) fn check_non_negative(owner: &str, attribute: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{owner}: {attribute} must be positive ({value})"
        )))
    }
}

/// Where a terminal is attached.
///
/// In node-breaker voltage levels only `node` is set.  In bus-breaker
/// voltage levels, `bus` attaches the terminal connected to that bus, and
/// `connectable_bus` alone attaches it disconnected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerminalSpec {
    pub voltage_level: String,
    pub node: Option<usize>,
    pub bus: Option<String>,
    pub connectable_bus: Option<String>,
}

impl TerminalSpec {
    pub fn at_node(voltage_level: &str, node: usize) -> Self {
        Self {
            voltage_level: voltage_level.to_string(),
            node: Some(node),
            ..Default::default()
        }
    }

    /// A terminal connected to the given configured bus.
    pub fn at_bus(voltage_level: &str, bus: &str) -> Self {
        Self {
            voltage_level: voltage_level.to_string(),
            bus: Some(bus.to_string()),
            connectable_bus: Some(bus.to_string()),
            ..Default::default()
        }
    }

    /// A terminal mapped to the given configured bus, but disconnected from
    /// it.
    pub fn near_bus(voltage_level: &str, bus: &str) -> Self {
        Self {
            voltage_level: voltage_level.to_string(),
            connectable_bus: Some(bus.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn target(&self, owner: &str) -> Result<TerminalTarget, Error> {
        match (self.node, &self.bus, &self.connectable_bus) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::validation(format!(
                "{owner}: connection node and connection bus are exclusives"
            ))),
            (Some(node), None, None) => Ok(TerminalTarget::Node(node)),
            (None, None, None) => Err(Error::validation(format!(
                "{owner}: connectable bus is not set"
            ))),
            (None, Some(bus), Some(connectable_bus)) if bus != connectable_bus => {
                Err(Error::validation(format!(
                    "{owner}: connection bus is different to connectable bus"
                )))
            }
            (None, Some(bus), _) => Ok(TerminalTarget::Bus {
                bus: bus.clone(),
                connected: true,
            }),
            (None, None, Some(connectable_bus)) => Ok(TerminalTarget::Bus {
                bus: connectable_bus.clone(),
                connected: false,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TerminalTarget {
    Node(usize),
    Bus { bus: String, connected: bool },
}

#[derive(Clone, Debug, Default)]
pub struct SubstationSpec {
    pub id: String,
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct VoltageLevelSpec {
    pub id: String,
    pub name: Option<String>,
    pub substation: Option<String>,
    pub nominal_v: f64,
    pub topology_kind: TopologyKind,
    pub fictitious: bool,
}

impl VoltageLevelSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        check_positive(
            &format!("Voltage level '{}'", self.id),
            "nominal voltage",
            self.nominal_v,
        )
    }
}

/// A configured bus of a bus-breaker voltage level.
#[derive(Clone, Debug, Default)]
pub struct BusSpec {
    pub id: String,
    pub name: Option<String>,
    pub voltage_level: String,
}

/// The ends of a switch.
#[derive(Clone, Debug, PartialEq)]
pub enum SwitchEnds {
    Nodes(usize, usize),
    Buses(String, String),
}

#[derive(Clone, Debug)]
pub struct SwitchSpec {
    pub id: String,
    pub name: Option<String>,
    pub voltage_level: String,
    pub kind: SwitchKind,
    pub ends: SwitchEnds,
    pub open: bool,
    pub retained: bool,
    pub fictitious: bool,
}

impl SwitchSpec {
    /// A closed switch between two nodes of a node-breaker voltage level.
    pub fn between_nodes(
        id: &str,
        voltage_level: &str,
        kind: SwitchKind,
        node1: usize,
        node2: usize,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            voltage_level: voltage_level.to_string(),
            kind,
            ends: SwitchEnds::Nodes(node1, node2),
            open: false,
            retained: false,
            fictitious: false,
        }
    }

    /// A closed breaker between two buses of a bus-breaker voltage level.
    pub fn between_buses(id: &str, voltage_level: &str, bus1: &str, bus2: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            voltage_level: voltage_level.to_string(),
            kind: SwitchKind::Breaker,
            ends: SwitchEnds::Buses(bus1.to_string(), bus2.to_string()),
            open: false,
            retained: false,
            fictitious: false,
        }
    }

    pub fn with_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    pub fn with_fictitious(mut self, fictitious: bool) -> Self {
        self.fictitious = fictitious;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct BusbarSectionSpec {
    pub id: String,
    pub name: Option<String>,
    pub voltage_level: String,
    pub node: usize,
}

#[derive(Clone, Debug, Default)]
pub struct LoadSpec {
    pub id: String,
    pub name: Option<String>,
    pub terminal: TerminalSpec,
    pub p0: f64,
    pub q0: f64,
}

impl LoadSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("Load '{}'", self.id);
        check_finite(&owner, "p0", self.p0)?;
        check_finite(&owner, "q0", self.q0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct GeneratorSpec {
    pub id: String,
    pub name: Option<String>,
    pub terminal: TerminalSpec,
    pub min_p: f64,
    pub max_p: f64,
    pub target_p: f64,
    pub target_q: f64,
    pub target_v: f64,
    pub voltage_regulator_on: bool,
    /// A remote terminal to regulate instead of the generator's own.
    pub regulating_terminal: Option<TerminalId>,
}

impl GeneratorSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("Generator '{}'", self.id);
        check_finite(&owner, "minimum P", self.min_p)?;
        check_finite(&owner, "maximum P", self.max_p)?;
        if self.min_p > self.max_p {
            return Err(Error::validation(format!(
                "{owner}: invalid active limits [{}, {}]",
                self.min_p, self.max_p
            )));
        }
        check_finite(&owner, "active power setpoint", self.target_p)?;
        check_voltage_regulation(
            &owner,
            self.voltage_regulator_on,
            self.target_v,
            self.target_q,
        )
    }
}

pub(crate) fn check_voltage_regulation(
    owner: &str,
    voltage_regulator_on: bool,
    target_v: f64,
    target_q: f64,
) -> Result<(), Error> {
    if voltage_regulator_on {
        check_positive(owner, "voltage setpoint", target_v)
    } else {
        check_finite(owner, "reactive power setpoint", target_q)
    }
}

#[derive(Clone, Debug, Default)]
pub struct LineSpec {
    pub id: String,
    pub name: Option<String>,
    pub terminal1: TerminalSpec,
    pub terminal2: TerminalSpec,
    pub r: f64,
    pub x: f64,
    pub g1: f64,
    pub b1: f64,
    pub g2: f64,
    pub b2: f64,
}

impl LineSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("Line '{}'", self.id);
        for (attribute, value) in [
            ("r", self.r),
            ("x", self.x),
            ("g1", self.g1),
            ("b1", self.b1),
            ("g2", self.g2),
            ("b2", self.b2),
        ] {
            check_finite(&owner, attribute, value)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RatioTapChangerSpec {
    pub low_tap_position: i32,
    pub steps: Vec<RatioTapChangerStep>,
    pub tap_position: i32,
    pub load_tap_changing_capabilities: bool,
    pub regulating: bool,
    pub target_v: f64,
    pub regulation_terminal: Option<TerminalId>,
}

impl RatioTapChangerSpec {
    pub(crate) fn validate(&self, owner: &str) -> Result<(), Error> {
        if self.steps.is_empty() {
            return Err(Error::validation(format!(
                "{owner}: ratio tap changer should have at least one step"
            )));
        }
        let high_tap_position = self.low_tap_position + self.steps.len() as i32 - 1;
        check_tap_position(
            owner,
            self.tap_position,
            self.low_tap_position,
            high_tap_position,
        )?;
        if self.regulating {
            if !self.load_tap_changing_capabilities {
                return Err(Error::validation(format!(
                    "{owner}: a ratio tap changer without load tap changing capabilities \
                     cannot regulate"
                )));
            }
            check_positive(owner, "ratio tap changer target voltage", self.target_v)?;
        }
        Ok(())
    }
}

pub(crate) fn check_tap_position(
    owner: &str,
    position: i32,
    low: i32,
    high: i32,
) -> Result<(), Error> {
    if (low..=high).contains(&position) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{owner}: incorrect tap position {position} [{low}, {high}]"
        )))
    }
}

#[derive(Clone, Debug, Default)]
pub struct TwoWindingsTransformerSpec {
    pub id: String,
    pub name: Option<String>,
    pub terminal1: TerminalSpec,
    pub terminal2: TerminalSpec,
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
    pub rated_u1: f64,
    pub rated_u2: f64,
    pub ratio_tap_changer: Option<RatioTapChangerSpec>,
}

impl TwoWindingsTransformerSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("2 windings transformer '{}'", self.id);
        for (attribute, value) in [("r", self.r), ("x", self.x), ("g", self.g), ("b", self.b)] {
            check_finite(&owner, attribute, value)?;
        }
        check_positive(&owner, "rated U1", self.rated_u1)?;
        check_positive(&owner, "rated U2", self.rated_u2)?;
        if let Some(rtc) = &self.ratio_tap_changer {
            rtc.validate(&owner)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct LegSpec {
    pub terminal: TerminalSpec,
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
    pub rated_u: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ThreeWindingsTransformerSpec {
    pub id: String,
    pub name: Option<String>,
    pub rated_u0: f64,
    pub legs: [LegSpec; 3],
}

impl ThreeWindingsTransformerSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("3 windings transformer '{}'", self.id);
        check_positive(&owner, "rated U0", self.rated_u0)?;
        for (i, leg) in self.legs.iter().enumerate() {
            let leg_owner = format!("{owner} leg {}", i + 1);
            for (attribute, value) in [("r", leg.r), ("x", leg.x), ("g", leg.g), ("b", leg.b)] {
                check_finite(&leg_owner, attribute, value)?;
            }
            check_positive(&leg_owner, "rated U", leg.rated_u)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct HvdcConverterStationSpec {
    pub id: String,
    pub name: Option<String>,
    pub terminal: TerminalSpec,
    /// Losses, in percent of the power flowing through the station.
    pub loss_factor: f64,
}

impl HvdcConverterStationSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("HVDC converter station '{}'", self.id);
        if !(0.0..=100.0).contains(&self.loss_factor) {
            return Err(Error::validation(format!(
                "{owner}: loss factor must be between 0 and 100 ({})",
                self.loss_factor
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct HvdcLineSpec {
    pub id: String,
    pub name: Option<String>,
    pub r: f64,
    pub nominal_v: f64,
    pub max_p: f64,
    pub converters_mode: ConvertersMode,
    pub active_power_setpoint: f64,
    pub converter_station1: String,
    pub converter_station2: String,
}

impl HvdcLineSpec {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let owner = format!("HVDC line '{}'", self.id);
        check_non_negative(&owner, "resistance", self.r)?;
        check_positive(&owner, "nominal voltage", self.nominal_v)?;
        check_non_negative(&owner, "maximum active power", self.max_p)?;
        check_non_negative(&owner, "active power setpoint", self.active_power_setpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_targets() {
        assert_eq!(
            TerminalSpec::at_node("VL", 3).target("Load 'L'"),
            Ok(TerminalTarget::Node(3))
        );
        assert_eq!(
            TerminalSpec::at_bus("VL", "B1").target("Load 'L'"),
            Ok(TerminalTarget::Bus {
                bus: "B1".into(),
                connected: true
            })
        );
        assert_eq!(
            TerminalSpec::near_bus("VL", "B1").target("Load 'L'"),
            Ok(TerminalTarget::Bus {
                bus: "B1".into(),
                connected: false
            })
        );

        let both = TerminalSpec {
            bus: Some("B1".into()),
            ..TerminalSpec::at_node("VL", 3)
        };
        assert_eq!(
            both.target("Load 'L'"),
            Err(Error::validation(
                "Load 'L': connection node and connection bus are exclusives"
            ))
        );
        assert_eq!(
            TerminalSpec::default().target("Load 'L'"),
            Err(Error::validation("Load 'L': connectable bus is not set"))
        );
        let mismatch = TerminalSpec {
            connectable_bus: Some("B2".into()),
            ..TerminalSpec::at_bus("VL", "B1")
        };
        assert_eq!(
            mismatch.target("Load 'L'"),
            Err(Error::validation(
                "Load 'L': connection bus is different to connectable bus"
            ))
        );
    }

    #[test]
    fn test_generator_validation() {
        let mut spec = GeneratorSpec {
            id: "G".into(),
            min_p: 0.0,
            max_p: 100.0,
            target_p: 50.0,
            voltage_regulator_on: true,
            target_v: 0.0,
            ..Default::default()
        };
        assert_eq!(
            spec.validate(),
            Err(Error::validation(
                "Generator 'G': voltage setpoint must be strictly positive (0)"
            ))
        );
        spec.target_v = 400.0;
        assert_eq!(spec.validate(), Ok(()));
        spec.min_p = 200.0;
        assert_eq!(
            spec.validate(),
            Err(Error::validation("Generator 'G': invalid active limits [200, 100]"))
        );
    }

    #[test]
    fn test_tap_changer_validation() {
        let spec = RatioTapChangerSpec {
            low_tap_position: 0,
            steps: vec![RatioTapChangerStep::default(); 3],
            tap_position: 3,
            load_tap_changing_capabilities: false,
            regulating: false,
            target_v: f64::NAN,
            regulation_terminal: None,
        };
        assert_eq!(
            spec.validate("T"),
            Err(Error::validation("T: incorrect tap position 3 [0, 2]"))
        );
        let spec = RatioTapChangerSpec {
            tap_position: 1,
            regulating: true,
            ..spec
        };
        assert!(spec.validate("T").is_err());
    }
}
