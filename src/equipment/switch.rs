// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

use crate::{
    identifiable::VoltageLevelId,
    variant::{MultiVariantObject, VariantArray, VariantOp},
    Identifiable, IdentifiableType,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    #[default]
    Breaker,
    Disconnector,
    LoadBreakSwitch,
}

impl std::fmt::Display for SwitchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchKind::Breaker => write!(f, "Breaker"),
            SwitchKind::Disconnector => write!(f, "Disconnector"),
            SwitchKind::LoadBreakSwitch => write!(f, "LoadBreakSwitch"),
        }
    }
}

/// A switch between two nodes or two configured buses of a voltage level.
#[derive(Clone, Debug)]
pub struct Switch {
    id: String,
    name: Option<String>,
    voltage_level: VoltageLevelId,
    kind: SwitchKind,
    fictitious: bool,
    open: VariantArray<bool>,
    retained: VariantArray<bool>,
}

impl Switch {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        name: Option<String>,
        voltage_level: VoltageLevelId,
        kind: SwitchKind,
        fictitious: bool,
        open: bool,
        retained: bool,
        variant_array_size: usize,
    ) -> Self {
        Self {
            id,
            name,
            voltage_level,
            kind,
            fictitious,
            open: VariantArray::new(variant_array_size, open),
            retained: VariantArray::new(variant_array_size, retained),
        }
    }

    pub fn voltage_level(&self) -> VoltageLevelId {
        self.voltage_level
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    pub fn is_fictitious(&self) -> bool {
        self.fictitious
    }

    pub fn is_breaker(&self) -> bool {
        self.kind == SwitchKind::Breaker
    }

    pub fn is_open(&self, variant: usize) -> bool {
        *self.open.get(variant)
    }

    /// Returns whether the switch is kept in the bus-breaker view of a
    /// node-breaker voltage level.
    pub fn is_retained(&self, variant: usize) -> bool {
        *self.retained.get(variant)
    }

    pub(crate) fn set_open(&mut self, variant: usize, open: bool) -> bool {
        self.open.set(variant, open)
    }

    pub(crate) fn set_retained(&mut self, variant: usize, retained: bool) -> bool {
        self.retained.set(variant, retained)
    }
}

impl Identifiable for Switch {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        IdentifiableType::Switch
    }
}

impl MultiVariantObject for Switch {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.open.apply_variant_op(op);
        self.retained.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.open.variant_array_size()
    }
}
