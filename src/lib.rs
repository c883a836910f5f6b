// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

/*!
# Power Network Model

This is a library for holding an electrical power network in memory:
substations, voltage levels, lines, transformers, injections, HVDC links and
the switches wiring them together, along with the state of every element in
any number of variants.

## The `Network`

The main struct is [`Network`].  Objects are added to it from plain specs,
such as [`LoadSpec`] or [`SwitchSpec`], through its `add_*` methods.  Specs
are validated in full before anything changes, so a rejected spec leaves the
network untouched.  Every object has an id that is unique across the whole
network, and can be looked up by id or by the typed handle returned when it
was added.

## Variants

Variant-dependent attributes (switch positions, setpoints, tap positions,
bus-breaker connections, ...) are stored in [`VariantArray`]s, with one slot
per variant.  The [`VariantManager`] of a network names the variants and
resizes every array in lock-step when variants are cloned or removed.
Setters act on the working variant of the caller, which can be tracked per
thread so that several readers can each work on their own variant.

## Topology

Each voltage level has either a node-breaker topology, made of numbered
nodes joined by switches, or a bus-breaker topology, made of declared buses
joined by switches.  Both can be seen through:

- a [`BusView`], where buses are merged across closed switches;
- a [`BusBreakerView`], which keeps retained switches apart;
- a [`NodeBreakerView`], only for node-breaker voltage levels.

Views are calculated on first use and cached per variant.  Any change to a
switch graph drops the cached views of the variants it touched.

On top of the views, the network computes its connected and synchronous
[`Component`]s, connects and disconnects groups of terminals as a whole, and
can be traversed from any terminal with a [`TopologyTraverser`].
*/

mod arena;
mod config;
mod equipment;
mod error;
mod identifiable;
mod index;
mod listener;
mod network;
mod topology;
mod variant;

pub use config::{NetworkConfig, DEFAULT_MAX_NODE_INDEX};
pub use equipment::{
    BusSpec, BusbarSectionSpec, ConfiguredBus, Connectable, ConnectableKind, ConvertersMode,
    Generator, GeneratorSpec, HvdcConverterStation, HvdcConverterStationSpec, HvdcLine,
    HvdcLineSpec, Leg, LegSpec, Line, LineSpec, Load, LoadSpec, RatioTapChanger,
    RatioTapChangerSpec, RatioTapChangerStep, ReferrerRole, Side, Substation, SubstationSpec,
    Switch, SwitchEnds, SwitchKind, SwitchSpec, Terminal, TerminalSpec, ThreeWindingsTransformer,
    ThreeWindingsTransformerSpec, TwoWindingsTransformer, TwoWindingsTransformerSpec,
    VoltageLevel, VoltageLevelSpec,
};
pub use error::{Error, ErrorKind};
pub use identifiable::{
    ConnectableId, ElementRef, HvdcLineId, Identifiable, IdentifiableType, SubstationId,
    TerminalId, VoltageLevelId,
};
pub use listener::{AttributeValue, ListenerId, NetworkListener};
pub use network::{
    BusBreakerView, BusView, Component, ComponentKind, Network, NodeBreakerView,
    StagedTopologyChange, TopologyTraverser, TraverseResult, VariantExtension,
};
pub use topology::{Bus, BusMembers, SwitchPredicate, TopologyKind};
pub use variant::{MultiVariantObject, VariantArray, VariantManager, VariantOp, INITIAL_VARIANT_ID};
