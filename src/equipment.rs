// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The objects a network is made of.

mod bus;
mod connectable;
mod container;
mod specs;
mod switch;
mod terminal;

pub use bus::ConfiguredBus;
pub use connectable::{
    Connectable, ConnectableKind, Generator, HvdcConverterStation, Leg, Line, Load,
    RatioTapChanger, RatioTapChangerStep, ThreeWindingsTransformer, TwoWindingsTransformer,
};
pub use container::{ConvertersMode, HvdcLine, Substation, VoltageLevel};
pub(crate) use specs::{
    check_finite, check_tap_position, check_voltage_regulation, TerminalTarget,
};
pub use specs::{
    BusSpec, BusbarSectionSpec, GeneratorSpec, HvdcConverterStationSpec, HvdcLineSpec, LegSpec,
    LineSpec, LoadSpec, RatioTapChangerSpec, SubstationSpec, SwitchEnds, SwitchSpec,
    TerminalSpec, ThreeWindingsTransformerSpec, TwoWindingsTransformerSpec, VoltageLevelSpec,
};
pub use switch::{Switch, SwitchKind};
pub(crate) use terminal::{Referrer, TerminalKind};
pub use terminal::{ReferrerRole, Side, Terminal};
