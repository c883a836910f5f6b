// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Attachment points of equipment to voltage levels.

use crate::{
    identifiable::{ConnectableId, TerminalId, VoltageLevelId},
    variant::{MultiVariantObject, VariantArray, VariantOp},
};

/// The side of a multi-terminal equipment a terminal belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    One,
    Two,
    Three,
}

impl Side {
    pub(crate) fn from_position(position: usize) -> Self {
        match position {
            0 => Side::One,
            1 => Side::Two,
            _ => Side::Three,
        }
    }

    pub(crate) fn position(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
            Side::Three => 2,
        }
    }
}

/// How a terminal is wired into the topology of its voltage level.
#[derive(Clone, Debug)]
pub(crate) enum TerminalKind {
    /// A terminal at a fixed node of a node-breaker topology.  Whether it is
    /// connected follows from the state of the switches around it.
    Node { node: usize },
    /// A terminal of a bus-breaker topology, mapped to a configured bus and
    /// connected to it or not, independently in each variant.
    Bus {
        connectable_bus: VariantArray<String>,
        connected: VariantArray<bool>,
    },
}

/// What a referrer does with the terminal it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferrerRole {
    /// A generator regulating the voltage at the terminal.
    GeneratorRegulation,
    /// A ratio tap changer regulating the voltage at the terminal.
    TapChangerRegulation,
}

/// An equipment holding a reference to a terminal it does not own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Referrer {
    pub(crate) connectable: ConnectableId,
    pub(crate) role: ReferrerRole,
}

/// The attachment point of one side of an equipment to a voltage level.
///
/// Terminals are owned by their [`Connectable`][crate::Connectable] and live
/// exactly as long as it does.
#[derive(Clone, Debug)]
pub struct Terminal {
    id: TerminalId,
    voltage_level: VoltageLevelId,
    side: Option<Side>,
    kind: TerminalKind,
    p: VariantArray<f64>,
    q: VariantArray<f64>,
    referrers: Vec<Referrer>,
}

impl Terminal {
    pub(crate) fn new(
        id: TerminalId,
        voltage_level: VoltageLevelId,
        side: Option<Side>,
        kind: TerminalKind,
        variant_array_size: usize,
    ) -> Self {
        Self {
            id,
            voltage_level,
            side,
            kind,
            p: VariantArray::new(variant_array_size, f64::NAN),
            q: VariantArray::new(variant_array_size, f64::NAN),
            referrers: Vec::new(),
        }
    }

    pub fn id(&self) -> TerminalId {
        self.id
    }

    pub fn voltage_level(&self) -> VoltageLevelId {
        self.voltage_level
    }

    /// Returns the side of the terminal, or `None` for single terminal
    /// equipment.
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    /// Returns the node of the terminal if it is a node-breaker terminal.
    pub fn node(&self) -> Option<usize> {
        match &self.kind {
            TerminalKind::Node { node } => Some(*node),
            TerminalKind::Bus { .. } => None,
        }
    }

    /// Returns the configured bus of a bus-breaker terminal in the given
    /// variant, whether the terminal is connected to it or not.
    pub fn connectable_bus(&self, variant: usize) -> Option<&str> {
        match &self.kind {
            TerminalKind::Node { .. } => None,
            TerminalKind::Bus {
                connectable_bus, ..
            } => Some(connectable_bus.get(variant)),
        }
    }

    /// Returns the active power flowing into the equipment at this terminal.
    pub fn p(&self, variant: usize) -> f64 {
        *self.p.get(variant)
    }

    /// Returns the reactive power flowing into the equipment at this
    /// terminal.
    pub fn q(&self, variant: usize) -> f64 {
        *self.q.get(variant)
    }

    pub(crate) fn kind(&self) -> &TerminalKind {
        &self.kind
    }

    /// Returns the connection flag of a bus-breaker terminal.
    pub(crate) fn bus_connected(&self, variant: usize) -> Option<bool> {
        match &self.kind {
            TerminalKind::Node { .. } => None,
            TerminalKind::Bus { connected, .. } => Some(*connected.get(variant)),
        }
    }

    pub(crate) fn set_p(&mut self, variant: usize, p: f64) -> f64 {
        self.p.set(variant, p)
    }

    pub(crate) fn set_q(&mut self, variant: usize, q: f64) -> f64 {
        self.q.set(variant, q)
    }

    /// Sets the connection flag of a bus-breaker terminal and returns the
    /// previous one.
    pub(crate) fn set_bus_connected(&mut self, variant: usize, value: bool) -> Option<bool> {
        match &mut self.kind {
            TerminalKind::Node { .. } => None,
            TerminalKind::Bus { connected, .. } => Some(connected.set(variant, value)),
        }
    }

    /// Moves a bus-breaker terminal to another configured bus and returns the
    /// previous one.
    pub(crate) fn set_connectable_bus(&mut self, variant: usize, bus: String) -> Option<String> {
        match &mut self.kind {
            TerminalKind::Node { .. } => None,
            TerminalKind::Bus {
                connectable_bus, ..
            } => Some(connectable_bus.set(variant, bus)),
        }
    }

    /// Returns the configured buses the terminal is mapped to, over all live
    /// variants.
    pub(crate) fn all_connectable_buses(&self) -> Vec<&str> {
        match &self.kind {
            TerminalKind::Node { .. } => Vec::new(),
            TerminalKind::Bus {
                connectable_bus, ..
            } => {
                let mut buses = connectable_bus
                    .live_values()
                    .map(String::as_str)
                    .collect::<Vec<_>>();
                buses.sort_unstable();
                buses.dedup();
                buses
            }
        }
    }

    pub(crate) fn referrers(&self) -> &[Referrer] {
        &self.referrers
    }

    pub(crate) fn add_referrer(&mut self, referrer: Referrer) {
        if !self.referrers.contains(&referrer) {
            self.referrers.push(referrer);
        }
    }

    pub(crate) fn remove_referrer(&mut self, referrer: &Referrer) {
        self.referrers.retain(|r| r != referrer);
    }
}

impl MultiVariantObject for Terminal {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.p.apply_variant_op(op);
        self.q.apply_variant_op(op);
        if let TerminalKind::Bus {
            connectable_bus,
            connected,
        } = &mut self.kind
        {
            connectable_bus.apply_variant_op(op);
            connected.apply_variant_op(op);
        }
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.p.variant_array_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    fn bus_terminal() -> Terminal {
        Terminal::new(
            TerminalId::new(ConnectableId::from_index(0), 0),
            VoltageLevelId::from_index(0),
            None,
            TerminalKind::Bus {
                connectable_bus: VariantArray::new(1, "B1".to_string()),
                connected: VariantArray::new(1, true),
            },
            1,
        )
    }

    #[test]
    fn test_bus_terminal_variants() {
        let mut terminal = bus_terminal();
        terminal.extend_variant_array_size(1, 1, 0);
        assert_eq!(terminal.set_bus_connected(1, false), Some(true));
        assert_eq!(
            terminal.set_connectable_bus(1, "B2".to_string()),
            Some("B1".to_string())
        );
        assert_eq!(terminal.bus_connected(0), Some(true));
        assert_eq!(terminal.bus_connected(1), Some(false));
        assert_eq!(terminal.connectable_bus(1), Some("B2"));
        assert_eq!(terminal.all_connectable_buses(), vec!["B1", "B2"]);
        assert!(terminal.p(1).is_nan());
        assert_eq!(terminal.node(), None);
    }

    #[test]
    fn test_referrers_are_registered_once() {
        let mut terminal = bus_terminal();
        let referrer = Referrer {
            connectable: ConnectableId::from_index(4),
            role: ReferrerRole::GeneratorRegulation,
        };
        terminal.add_referrer(referrer);
        terminal.add_referrer(referrer);
        assert_eq!(terminal.referrers().len(), 1);
        terminal.remove_referrer(&referrer);
        assert!(terminal.referrers().is_empty());
    }
}
