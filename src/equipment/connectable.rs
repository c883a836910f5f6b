// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Equipment attached to voltage levels through terminals.

use super::{ReferrerRole, Side, Terminal};
use crate::{
    identifiable::{ConnectableId, SubstationId, TerminalId},
    variant::{MultiVariantObject, VariantArray, VariantOp},
    Identifiable, IdentifiableType,
};

/// A load with variant-dependent active and reactive power setpoints.
#[derive(Clone, Debug)]
pub struct Load {
    pub(crate) p0: VariantArray<f64>,
    pub(crate) q0: VariantArray<f64>,
}

impl Load {
    pub fn p0(&self, variant: usize) -> f64 {
        *self.p0.get(variant)
    }

    pub fn q0(&self, variant: usize) -> f64 {
        *self.q0.get(variant)
    }
}

/// A generator, possibly regulating the voltage of a remote terminal.
#[derive(Clone, Debug)]
pub struct Generator {
    pub(crate) min_p: f64,
    pub(crate) max_p: f64,
    pub(crate) target_p: VariantArray<f64>,
    pub(crate) target_q: VariantArray<f64>,
    pub(crate) target_v: VariantArray<f64>,
    pub(crate) voltage_regulator_on: VariantArray<bool>,
    pub(crate) regulating_terminal: TerminalId,
}

impl Generator {
    pub fn min_p(&self) -> f64 {
        self.min_p
    }

    pub fn max_p(&self) -> f64 {
        self.max_p
    }

    pub fn target_p(&self, variant: usize) -> f64 {
        *self.target_p.get(variant)
    }

    pub fn target_q(&self, variant: usize) -> f64 {
        *self.target_q.get(variant)
    }

    pub fn target_v(&self, variant: usize) -> f64 {
        *self.target_v.get(variant)
    }

    pub fn is_voltage_regulator_on(&self, variant: usize) -> bool {
        *self.voltage_regulator_on.get(variant)
    }

    /// Returns the terminal whose voltage the generator regulates.  This is
    /// the generator's own terminal unless a remote one was set.
    pub fn regulating_terminal(&self) -> TerminalId {
        self.regulating_terminal
    }
}

/// An AC line, with its pi-model parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Line {
    pub r: f64,
    pub x: f64,
    pub g1: f64,
    pub b1: f64,
    pub g2: f64,
    pub b2: f64,
}

/// One step of a ratio tap changer.
#[derive(Clone, Debug, PartialEq)]
pub struct RatioTapChangerStep {
    pub rho: f64,
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
}

impl Default for RatioTapChangerStep {
    fn default() -> Self {
        Self {
            rho: 1.0,
            r: 0.0,
            x: 0.0,
            g: 0.0,
            b: 0.0,
        }
    }
}

/// A ratio tap changer of a two-winding transformer.
#[derive(Clone, Debug)]
pub struct RatioTapChanger {
    pub(crate) low_tap_position: i32,
    pub(crate) steps: Vec<RatioTapChangerStep>,
    pub(crate) load_tap_changing_capabilities: bool,
    pub(crate) tap_position: VariantArray<i32>,
    pub(crate) regulating: VariantArray<bool>,
    pub(crate) target_v: VariantArray<f64>,
    pub(crate) regulation_terminal: Option<TerminalId>,
}

impl RatioTapChanger {
    pub fn low_tap_position(&self) -> i32 {
        self.low_tap_position
    }

    pub fn high_tap_position(&self) -> i32 {
        self.low_tap_position + self.steps.len() as i32 - 1
    }

    pub fn steps(&self) -> &[RatioTapChangerStep] {
        &self.steps
    }

    pub fn has_load_tap_changing_capabilities(&self) -> bool {
        self.load_tap_changing_capabilities
    }

    pub fn tap_position(&self, variant: usize) -> i32 {
        *self.tap_position.get(variant)
    }

    /// Returns the step at the current tap position.
    pub fn current_step(&self, variant: usize) -> &RatioTapChangerStep {
        let offset = self.tap_position(variant) - self.low_tap_position;
        &self.steps[offset as usize]
    }

    pub fn is_regulating(&self, variant: usize) -> bool {
        *self.regulating.get(variant)
    }

    pub fn target_v(&self, variant: usize) -> f64 {
        *self.target_v.get(variant)
    }

    pub fn regulation_terminal(&self) -> Option<TerminalId> {
        self.regulation_terminal
    }
}

impl MultiVariantObject for RatioTapChanger {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        self.tap_position.apply_variant_op(op);
        self.regulating.apply_variant_op(op);
        self.target_v.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.tap_position.variant_array_size()
    }
}

#[derive(Clone, Debug)]
pub struct TwoWindingsTransformer {
    pub(crate) substation: Option<SubstationId>,
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
    pub rated_u1: f64,
    pub rated_u2: f64,
    pub(crate) ratio_tap_changer: Option<RatioTapChanger>,
}

impl TwoWindingsTransformer {
    pub fn substation(&self) -> Option<SubstationId> {
        self.substation
    }

    pub fn ratio_tap_changer(&self) -> Option<&RatioTapChanger> {
        self.ratio_tap_changer.as_ref()
    }
}

/// One leg of a three-winding transformer, between its star point and one
/// of its terminals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Leg {
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
    pub rated_u: f64,
}

#[derive(Clone, Debug)]
pub struct ThreeWindingsTransformer {
    pub(crate) substation: Option<SubstationId>,
    pub rated_u0: f64,
    pub legs: [Leg; 3],
}

impl ThreeWindingsTransformer {
    pub fn substation(&self) -> Option<SubstationId> {
        self.substation
    }

    pub fn leg(&self, side: Side) -> &Leg {
        &self.legs[side.position()]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HvdcConverterStation {
    pub loss_factor: f64,
}

/// The type-specific part of a [`Connectable`].
#[derive(Clone, Debug)]
pub enum ConnectableKind {
    BusbarSection,
    Load(Load),
    Generator(Generator),
    Line(Line),
    TwoWindingsTransformer(TwoWindingsTransformer),
    ThreeWindingsTransformer(ThreeWindingsTransformer),
    HvdcConverterStation(HvdcConverterStation),
}

impl ConnectableKind {
    pub(crate) fn identifiable_type(&self) -> IdentifiableType {
        match self {
            ConnectableKind::BusbarSection => IdentifiableType::BusbarSection,
            ConnectableKind::Load(_) => IdentifiableType::Load,
            ConnectableKind::Generator(_) => IdentifiableType::Generator,
            ConnectableKind::Line(_) => IdentifiableType::Line,
            ConnectableKind::TwoWindingsTransformer(_) => IdentifiableType::TwoWindingsTransformer,
            ConnectableKind::ThreeWindingsTransformer(_) => {
                IdentifiableType::ThreeWindingsTransformer
            }
            ConnectableKind::HvdcConverterStation(_) => IdentifiableType::HvdcConverterStation,
        }
    }
}

impl MultiVariantObject for ConnectableKind {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        match self {
            ConnectableKind::Load(load) => {
                load.p0.apply_variant_op(op);
                load.q0.apply_variant_op(op);
            }
            ConnectableKind::Generator(generator) => {
                generator.target_p.apply_variant_op(op);
                generator.target_q.apply_variant_op(op);
                generator.target_v.apply_variant_op(op);
                generator.voltage_regulator_on.apply_variant_op(op);
            }
            ConnectableKind::TwoWindingsTransformer(transformer) => {
                if let Some(rtc) = &mut transformer.ratio_tap_changer {
                    rtc.apply_variant_op(op);
                }
            }
            ConnectableKind::BusbarSection
            | ConnectableKind::Line(_)
            | ConnectableKind::ThreeWindingsTransformer(_)
            | ConnectableKind::HvdcConverterStation(_) => {}
        }
    }

    fn variant_array_size(&self) -> Option<usize> {
        match self {
            ConnectableKind::Load(load) => load.p0.variant_array_size(),
            ConnectableKind::Generator(generator) => generator.target_p.variant_array_size(),
            ConnectableKind::TwoWindingsTransformer(transformer) => transformer
                .ratio_tap_changer
                .as_ref()
                .and_then(|rtc| rtc.variant_array_size()),
            ConnectableKind::BusbarSection
            | ConnectableKind::Line(_)
            | ConnectableKind::ThreeWindingsTransformer(_)
            | ConnectableKind::HvdcConverterStation(_) => None,
        }
    }
}

/// An equipment owning one to three terminals.
#[derive(Clone, Debug)]
pub struct Connectable {
    id: String,
    name: Option<String>,
    terminals: Vec<Terminal>,
    kind: ConnectableKind,
}

impl Connectable {
    pub(crate) fn new(
        id: String,
        name: Option<String>,
        terminals: Vec<Terminal>,
        kind: ConnectableKind,
    ) -> Self {
        Self {
            id,
            name,
            terminals,
            kind,
        }
    }

    /// Returns the terminals of the connectable, ordered by side.
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn terminal(&self, side: Side) -> Option<&Terminal> {
        self.terminals.get(side.position())
    }

    pub fn kind(&self) -> &ConnectableKind {
        &self.kind
    }

    pub fn as_load(&self) -> Option<&Load> {
        match &self.kind {
            ConnectableKind::Load(load) => Some(load),
            _ => None,
        }
    }

    pub fn as_generator(&self) -> Option<&Generator> {
        match &self.kind {
            ConnectableKind::Generator(generator) => Some(generator),
            _ => None,
        }
    }

    pub fn as_two_windings_transformer(&self) -> Option<&TwoWindingsTransformer> {
        match &self.kind {
            ConnectableKind::TwoWindingsTransformer(transformer) => Some(transformer),
            _ => None,
        }
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ConnectableKind {
        &mut self.kind
    }

    pub(crate) fn terminal_at(&self, position: usize) -> Option<&Terminal> {
        self.terminals.get(position)
    }

    pub(crate) fn terminal_at_mut(&mut self, position: usize) -> Option<&mut Terminal> {
        self.terminals.get_mut(position)
    }

    /// Returns the remote terminals this connectable refers to, with the role
    /// of each reference.
    pub(crate) fn referenced_terminals(
        &self,
        own: ConnectableId,
    ) -> Vec<(TerminalId, ReferrerRole)> {
        let mut referenced = Vec::new();
        match &self.kind {
            ConnectableKind::Generator(generator) => {
                if generator.regulating_terminal.connectable() != own {
                    referenced.push((
                        generator.regulating_terminal,
                        ReferrerRole::GeneratorRegulation,
                    ));
                }
            }
            ConnectableKind::TwoWindingsTransformer(transformer) => {
                if let Some(terminal) = transformer
                    .ratio_tap_changer
                    .as_ref()
                    .and_then(|rtc| rtc.regulation_terminal)
                {
                    if terminal.connectable() != own {
                        referenced.push((terminal, ReferrerRole::TapChangerRegulation));
                    }
                }
            }
            _ => {}
        }
        referenced
    }

    /// Drops the reference held in `role` after the referenced terminal was
    /// removed from the network.
    pub(crate) fn on_referenced_removal(&mut self, own: ConnectableId, role: ReferrerRole) {
        match (&mut self.kind, role) {
            (ConnectableKind::Generator(generator), ReferrerRole::GeneratorRegulation) => {
                generator.regulating_terminal = TerminalId::new(own, 0);
            }
            (
                ConnectableKind::TwoWindingsTransformer(transformer),
                ReferrerRole::TapChangerRegulation,
            ) => {
                if let Some(rtc) = &mut transformer.ratio_tap_changer {
                    rtc.regulation_terminal = None;
                    rtc.regulating.live_values_mut().for_each(|r| *r = false);
                }
            }
            (_, role) => {
                tracing::warn!("Connectable '{}' does not refer to terminals as {role:?}", self.id);
            }
        }
    }
}

impl Identifiable for Connectable {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn identifiable_type(&self) -> IdentifiableType {
        self.kind.identifiable_type()
    }
}

impl MultiVariantObject for Connectable {
    fn apply_variant_op(&mut self, op: &VariantOp) {
        for terminal in &mut self.terminals {
            terminal.apply_variant_op(op);
        }
        self.kind.apply_variant_op(op);
    }

    fn variant_array_size(&self) -> Option<usize> {
        self.terminals
            .first()
            .and_then(|terminal| terminal.variant_array_size())
            .or_else(|| self.kind.variant_array_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    fn transformer_with_rtc() -> ConnectableKind {
        ConnectableKind::TwoWindingsTransformer(TwoWindingsTransformer {
            substation: None,
            r: 0.5,
            x: 10.0,
            g: 0.0,
            b: 0.0,
            rated_u1: 225.0,
            rated_u2: 63.0,
            ratio_tap_changer: Some(RatioTapChanger {
                low_tap_position: -1,
                steps: vec![
                    RatioTapChangerStep {
                        rho: 0.9,
                        ..Default::default()
                    },
                    RatioTapChangerStep::default(),
                    RatioTapChangerStep {
                        rho: 1.1,
                        ..Default::default()
                    },
                ],
                load_tap_changing_capabilities: true,
                tap_position: VariantArray::new(1, 0),
                regulating: VariantArray::new(1, true),
                target_v: VariantArray::new(1, 63.0),
                regulation_terminal: Some(TerminalId::new(ConnectableId::from_index(7), 0)),
            }),
        })
    }

    #[test]
    fn test_tap_changer() {
        let ConnectableKind::TwoWindingsTransformer(transformer) = transformer_with_rtc() else {
            unreachable!()
        };
        let rtc = transformer.ratio_tap_changer().unwrap();
        assert_eq!(rtc.high_tap_position(), 1);
        assert_eq!(rtc.current_step(0), &RatioTapChangerStep::default());
    }

    #[test]
    fn test_referenced_removal_clears_regulation() {
        let own = ConnectableId::from_index(1);
        let mut transformer =
            Connectable::new("T".to_string(), None, Vec::new(), transformer_with_rtc());
        transformer.kind_mut().extend_variant_array_size(1, 1, 0);

        let referenced = transformer.referenced_terminals(own);
        assert_eq!(
            referenced,
            vec![(
                TerminalId::new(ConnectableId::from_index(7), 0),
                ReferrerRole::TapChangerRegulation
            )]
        );

        transformer.on_referenced_removal(own, ReferrerRole::TapChangerRegulation);
        let rtc = transformer
            .as_two_windings_transformer()
            .and_then(|t| t.ratio_tap_changer())
            .unwrap();
        assert_eq!(rtc.regulation_terminal(), None);
        assert!(!rtc.is_regulating(0));
        assert!(!rtc.is_regulating(1));
        assert!(transformer.referenced_terminals(own).is_empty());
    }
}
