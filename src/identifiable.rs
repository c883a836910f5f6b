// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the `IdentifiableType` enum, which represents the
//! type of an object registered in a network, the `Identifiable` trait
//! shared by those objects, and the typed handles used to address them.

use std::fmt::Display;

/// Represents the type of an identifiable object.
///
/// The object index keeps one bucket per type, so the type of an object is
/// fixed when it is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentifiableType {
    Substation,
    VoltageLevel,
    Bus,
    Switch,
    BusbarSection,
    Load,
    Generator,
    Line,
    TwoWindingsTransformer,
    ThreeWindingsTransformer,
    HvdcConverterStation,
    HvdcLine,
}

impl Display for IdentifiableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifiableType::Substation => write!(f, "Substation"),
            IdentifiableType::VoltageLevel => write!(f, "VoltageLevel"),
            IdentifiableType::Bus => write!(f, "Bus"),
            IdentifiableType::Switch => write!(f, "Switch"),
            IdentifiableType::BusbarSection => write!(f, "BusbarSection"),
            IdentifiableType::Load => write!(f, "Load"),
            IdentifiableType::Generator => write!(f, "Generator"),
            IdentifiableType::Line => write!(f, "Line"),
            IdentifiableType::TwoWindingsTransformer => write!(f, "TwoWindingsTransformer"),
            IdentifiableType::ThreeWindingsTransformer => write!(f, "ThreeWindingsTransformer"),
            IdentifiableType::HvdcConverterStation => write!(f, "HvdcConverterStation"),
            IdentifiableType::HvdcLine => write!(f, "HvdcLine"),
        }
    }
}

/// This trait is implemented by every object that is registered in the
/// object index of a network.
pub trait Identifiable {
    /// Returns the id of the object, unique in the network.
    fn id(&self) -> &str;
    /// Returns the optional human readable name of the object.
    fn name(&self) -> Option<&str>;
    /// Returns the type of the object.
    fn identifiable_type(&self) -> IdentifiableType;

    /// Returns the name of the object if it has one, and its id otherwise.
    fn name_or_id(&self) -> &str {
        self.name().unwrap_or_else(|| self.id())
    }
}

/// Predicates for checking the type of an `Identifiable`.
pub(crate) trait TypePredicates: Identifiable {
    fn is_busbar_section(&self) -> bool {
        self.identifiable_type() == IdentifiableType::BusbarSection
    }

    /// Equipment whose terminals sit in more than one place of the network.
    fn is_branch(&self) -> bool {
        matches!(
            self.identifiable_type(),
            IdentifiableType::Line
                | IdentifiableType::TwoWindingsTransformer
                | IdentifiableType::ThreeWindingsTransformer
                | IdentifiableType::HvdcConverterStation
        )
    }

    /// Equipment that feeds or draws power at a bus.  Busbar sections are
    /// not feeders.
    fn is_feeder(&self) -> bool {
        !self.is_busbar_section()
    }
}

/// Implement the `TypePredicates` trait for all types that implement the
/// `Identifiable` trait.
impl<T: Identifiable + ?Sized> TypePredicates for T {}

/// A macro for defining the typed handles of the objects stored in a
/// network.
macro_rules! Handles {
    ($(
        $(#[$meta:meta])*
        $name:ident
    ),*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(usize);

            impl $name {
                /// Returns the position of the object in its arena.
                #[inline]
                pub fn index(&self) -> usize {
                    self.0
                }
            }

            impl crate::arena::ArenaKey for $name {
                fn from_index(index: usize) -> Self {
                    Self(index)
                }

                fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

Handles!(
    /// Handle of a substation.
    SubstationId,
    /// Handle of a voltage level.
    VoltageLevelId,
    /// Handle of a connectable equipment.
    ConnectableId,
    /// Handle of an HVDC line.
    HvdcLineId
);

/// Handle of a terminal: the owning connectable plus the position of the
/// terminal in the connectable's terminal list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalId {
    connectable: ConnectableId,
    position: usize,
}

impl TerminalId {
    pub(crate) fn new(connectable: ConnectableId, position: usize) -> Self {
        Self {
            connectable,
            position,
        }
    }

    /// Returns the connectable owning the terminal.
    pub fn connectable(&self) -> ConnectableId {
        self.connectable
    }

    /// Returns the position of the terminal in its connectable.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Where an identifiable object lives in the network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Substation(SubstationId),
    VoltageLevel(VoltageLevelId),
    /// A configured bus, stored in the topology of its voltage level.
    Bus(VoltageLevelId),
    /// A switch, stored in the topology of its voltage level.
    Switch(VoltageLevelId),
    Connectable(ConnectableId),
    HvdcLine(HvdcLineId),
}

/// Returns `base` if no object uses it as id, and `base#k` with the lowest
/// free `k` otherwise.
pub(crate) fn unique_id(base: String, contains: impl Fn(&str) -> bool) -> String {
    if !contains(&base) {
        return base;
    }
    let mut k = 0usize;
    loop {
        let candidate = format!("{base}#{k}");
        if !contains(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(IdentifiableType);

    impl Identifiable for Dummy {
        fn id(&self) -> &str {
            "dummy"
        }

        fn name(&self) -> Option<&str> {
            None
        }

        fn identifiable_type(&self) -> IdentifiableType {
            self.0
        }
    }

    #[test]
    fn test_predicates() {
        assert!(Dummy(IdentifiableType::BusbarSection).is_busbar_section());
        assert!(!Dummy(IdentifiableType::BusbarSection).is_feeder());
        assert!(Dummy(IdentifiableType::Load).is_feeder());
        assert!(!Dummy(IdentifiableType::Load).is_branch());
        assert!(Dummy(IdentifiableType::Line).is_branch());
        assert!(Dummy(IdentifiableType::HvdcConverterStation).is_branch());
        assert_eq!(Dummy(IdentifiableType::Load).name_or_id(), "dummy");
    }

    #[test]
    fn test_unique_id() {
        let taken = ["VL_0", "VL_0#0"];
        assert_eq!(unique_id("VL_1".into(), |id| taken.contains(&id)), "VL_1");
        assert_eq!(unique_id("VL_0".into(), |id| taken.contains(&id)), "VL_0#1");
    }
}
