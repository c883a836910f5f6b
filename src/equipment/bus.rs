// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

use crate::{
    identifiable::{TerminalId, VoltageLevelId},
    variant::{MultiVariantObject, VariantArray, VariantOp},
    Identifiable, IdentifiableType,
};

/// A bus declared in a bus-breaker voltage level.
///
/// The bus keeps, for each variant, the terminals mapped to it, whether they
/// are connected or not.
#[derive(Clone, Debug)]
pub struct ConfiguredBus {
    id: String,
    name: Option<String>,
    voltage_level: VoltageLevelId,
    v: VariantArray<f64>,
    angle: VariantArray<f64>,
    terminals: VariantArray<Vec<TerminalId>>,
}

impl ConfiguredBus {
    pub(crate) fn new(
        id: String,
        name: Option<String>,
        voltage_level: VoltageLevelId,
        variant_array_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            voltage_level,
            v: VariantArray::new(variant_array_size, f64::NAN),
            angle: VariantArray::new(variant_array_size, f64::NAN),
            terminals: VariantArray::new(variant_array_size, Vec::new()),
        }
    }

    pub fn voltage_level(&self) -> VoltageLevelId {
        self.voltage_level
    }

    pub fn v(&self, variant: usize) -> f64 {
        *self.v.get(variant)
    }

    pub fn angle(&self, variant: usize) -> f64 {
        *self.angle.get(variant)
    }

    /// Returns the terminals mapped to the bus in the given variant.
    pub fn terminals(&self, variant: usize) -> &[TerminalId] {
        self.terminals.get(variant)
    }

    pub(crate) fn set_v(&mut self, variant: usize, v: f64) -> f64 {
        self.v.set(variant, v)
    }

    pub(crate) fn set_angle(&mut self, variant: usize, angle: f64) -> f64 {
        self.angle.set(variant, angle)
    }

    /// Returns whether any live variant maps a terminal to the bus.
    pub(crate) fn has_terminals(&self) -> bool {
        self.terminals.live_values().any(|t| !t.is_empty())
    }

    /// Maps the terminal to the bus in every variant.
    pub(crate) fn add_terminal_everywhere(&mut self, terminal: TerminalId) {
        for terminals in self.terminals.live_values_mut() {
            terminals.push(terminal);
        }
    }

    pub(crate) fn add_terminal(&mut self, variant: usize, terminal: TerminalId) {
        self.terminals.get_mut(variant).push(terminal);
    }

    pub(crate) fn remove_terminal(&mut self, variant: usize, terminal: TerminalId) {
        self.terminals.get_mut(variant).retain(|t| *t != terminal);
    }

    /// Unmaps the terminal from the bus in every variant.
    pub(crate) fn remove_terminal_everywhere(&mut self, terminal: TerminalId) {
        for terminals in self.terminals.live_values_mut() {
            terminals.retain(|t| *t != terminal);
        }
    }
}

impl Identifiable for ConfiguredBus {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::Bus
    }
}

impl MultiVariantObject for ConfiguredBus {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.v.apply_variant_op(op);
        self.angle.apply_variant_op(op);
        self.terminals.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.v.variant_array_size()
    }
}
