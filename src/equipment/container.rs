// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Substations, voltage levels and HVDC lines.

use crate::{
    identifiable::{ConnectableId, SubstationId},
    topology::{TopologyKind, TopologyModel},
    variant::{MultiVariantObject, VariantArray, VariantOp},
    Identifiable, IdentifiableType,
};

#[derive(Clone, Debug)]
pub struct Substation {
    id: String,
    name: Option<String>,
    country: Option<String>,
}

impl Substation {
    pub(crate) fn new(id: String, name: Option<String>, country: Option<String>) -> Self {
        Self { id, name, country }
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

impl Identifiable for Substation {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::Substation
    }
}

/// A set of equipment at the same nominal voltage, wired together by a
/// node-breaker or a bus-breaker topology.
pub struct VoltageLevel {
    id: String,
    name: Option<String>,
    substation: Option<SubstationId>,
    nominal_v: f64,
    fictitious: bool,
    pub(crate) topology: TopologyModel,
}

impl VoltageLevel {
    pub(crate) fn new(
        id: String,
        name: Option<String>,
        substation: Option<SubstationId>,
        nominal_v: f64,
        fictitious: bool,
        topology: TopologyModel,
    ) -> Self {
        Self {
            id,
            name,
            substation,
            nominal_v,
            fictitious,
            topology,
        }
    }

    pub fn substation(&self) -> Option<SubstationId> {
        self.substation
    }

    pub fn nominal_v(&self) -> f64 {
        self.nominal_v
    }

    /// Returns whether the voltage level only exists for modelling purposes.
    pub fn is_fictitious(&self) -> bool {
        self.fictitious
    }

    pub fn topology_kind(&self) -> TopologyKind {
        self.topology.kind()
    }
}

impl Identifiable for VoltageLevel {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::VoltageLevel
    }
}

impl MultiVariantObject for VoltageLevel {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.topology.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.topology.variant_array_size()
    }
}

/// Which converter station of an HVDC line rectifies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConvertersMode {
    #[default]
    SideOneRectifierSideTwoInverter,
    SideOneInverterSideTwoRectifier,
}

/// A DC line between two converter stations.
#[derive(Clone, Debug)]
pub struct HvdcLine {
    id: String,
    name: Option<String>,
    pub(crate) r: f64,
    pub(crate) nominal_v: f64,
    pub(crate) max_p: f64,
    pub(crate) converters_mode: VariantArray<ConvertersMode>,
    pub(crate) active_power_setpoint: VariantArray<f64>,
    converter_stations: [ConnectableId; 2],
}

impl HvdcLine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        name: Option<String>,
        r: f64,
        nominal_v: f64,
        max_p: f64,
        converters_mode: ConvertersMode,
        active_power_setpoint: f64,
        converter_stations: [ConnectableId; 2],
        variant_array_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            r,
            nominal_v,
            max_p,
            converters_mode: VariantArray::new(variant_array_size, converters_mode),
            active_power_setpoint: VariantArray::new(variant_array_size, active_power_setpoint),
            converter_stations,
        }
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn nominal_v(&self) -> f64 {
        self.nominal_v
    }

    pub fn max_p(&self) -> f64 {
        self.max_p
    }

    pub fn converters_mode(&self, variant: usize) -> ConvertersMode {
        *self.converters_mode.get(variant)
    }

    pub fn active_power_setpoint(&self, variant: usize) -> f64 {
        *self.active_power_setpoint.get(variant)
    }

    /// Returns the converter stations at side one and side two.
    pub fn converter_stations(&self) -> [ConnectableId; 2] {
        self.converter_stations
    }
}

impl Identifiable for HvdcLine {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::HvdcLine
    }
}

impl MultiVariantObject for HvdcLine {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.converters_mode.apply_variant_op(op);
        self.active_power_setpoint.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.active_power_setpoint.variant_array_size()
    }
}
