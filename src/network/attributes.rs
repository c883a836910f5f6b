// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Setters for the attributes of the objects of a [`Network`].
//!
//! Variant-dependent attributes are written in the working variant of the
//! caller.  Every change is reported to the listeners, with the id of the
//! variant for variant-dependent attributes.

use indexmap::IndexMap;

use super::Network;
use crate::{
    equipment::{
        check_finite, check_tap_position, check_voltage_regulation, ConfiguredBus,
        ConnectableKind, ConvertersMode, Generator, Load, RatioTapChanger,
    },
    identifiable::{ElementRef, TerminalId, VoltageLevelId},
    listener::{AttributeValue, ListenerId, NetworkListener},
    Error, Identifiable, IdentifiableType,
};

impl Network {
    /// Adds a listener, notified of every later change to the network.
    pub fn add_listener(
        &mut self,
        listener: impl NetworkListener + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    fn switch_voltage_level(&self, id: &str) -> Result<VoltageLevelId, Error> {
        match self.index.get(id) {
            Some(ElementRef::Switch(key)) => Ok(*key),
            _ => Err(Error::element_not_found(format!("Switch '{id}' not found"))),
        }
    }

    /// Opens or closes a switch in the working variant.
    pub fn set_switch_open(&mut self, id: &str, open: bool) -> Result<(), Error> {
        let vl_key = self.switch_voltage_level(id)?;
        let variant = self.working_variant()?;
        let (old, change) = self
            .voltage_level_mut(vl_key)?
            .topology
            .set_switch_open(id, variant, open)?;
        self.propagate(vl_key, change);
        if old != open {
            self.notify_update(id, "open", Some(variant), old.into(), open.into());
        }
        Ok(())
    }

    /// Sets whether a switch of a node-breaker voltage level is kept in the
    /// bus-breaker view, in the working variant.
    pub fn set_switch_retained(&mut self, id: &str, retained: bool) -> Result<(), Error> {
        let vl_key = self.switch_voltage_level(id)?;
        let variant = self.working_variant()?;
        let (old, change) = self
            .voltage_level_mut(vl_key)?
            .topology
            .set_switch_retained(id, variant, retained)?;
        self.propagate(vl_key, change);
        if old != retained {
            self.notify_update(id, "retained", Some(variant), old.into(), retained.into());
        }
        Ok(())
    }

    fn connectable_kind_mut(
        &mut self,
        id: &str,
        kind: IdentifiableType,
    ) -> Result<&mut ConnectableKind, Error> {
        let key = self.connectable_key(id)?;
        let connectable = self
            .connectables
            .get_mut(key)
            .filter(|c| c.identifiable_type() == kind)
            .ok_or_else(|| Error::element_not_found(format!("{kind} '{id}' not found")))?;
        Ok(connectable.kind_mut())
    }

    fn load_mut(&mut self, id: &str) -> Result<&mut Load, Error> {
        match self.connectable_kind_mut(id, IdentifiableType::Load)? {
            ConnectableKind::Load(load) => Ok(load),
            _ => Err(Error::element_not_found(format!("Load '{id}' not found"))),
        }
    }

    fn generator_mut(&mut self, id: &str) -> Result<&mut Generator, Error> {
        match self.connectable_kind_mut(id, IdentifiableType::Generator)? {
            ConnectableKind::Generator(generator) => Ok(generator),
            _ => Err(Error::element_not_found(format!("Generator '{id}' not found"))),
        }
    }

    fn ratio_tap_changer_mut(&mut self, id: &str) -> Result<&mut RatioTapChanger, Error> {
        match self.connectable_kind_mut(id, IdentifiableType::TwoWindingsTransformer)? {
            ConnectableKind::TwoWindingsTransformer(transformer) => {
                transformer.ratio_tap_changer.as_mut().ok_or_else(|| {
                    Error::element_not_found(format!(
                        "TwoWindingsTransformer '{id}' has no ratio tap changer"
                    ))
                })
            }
            _ => Err(Error::element_not_found(format!(
                "TwoWindingsTransformer '{id}' not found"
            ))),
        }
    }

    pub fn set_load_p0(&mut self, id: &str, p0: f64) -> Result<(), Error> {
        check_finite(&format!("Load '{id}'"), "p0", p0)?;
        let variant = self.working_variant()?;
        let old = self.load_mut(id)?.p0.set(variant, p0);
        self.notify_update(id, "p0", Some(variant), old.into(), p0.into());
        Ok(())
    }

    pub fn set_load_q0(&mut self, id: &str, q0: f64) -> Result<(), Error> {
        check_finite(&format!("Load '{id}'"), "q0", q0)?;
        let variant = self.working_variant()?;
        let old = self.load_mut(id)?.q0.set(variant, q0);
        self.notify_update(id, "q0", Some(variant), old.into(), q0.into());
        Ok(())
    }

    pub fn set_generator_target_p(&mut self, id: &str, target_p: f64) -> Result<(), Error> {
        check_finite(
            &format!("Generator '{id}'"),
            "active power setpoint",
            target_p,
        )?;
        let variant = self.working_variant()?;
        let old = self.generator_mut(id)?.target_p.set(variant, target_p);
        self.notify_update(id, "target_p", Some(variant), old.into(), target_p.into());
        Ok(())
    }

    pub fn set_generator_target_q(&mut self, id: &str, target_q: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let generator = self.generator_mut(id)?;
        check_voltage_regulation(
            &format!("Generator '{id}'"),
            *generator.voltage_regulator_on.get(variant),
            *generator.target_v.get(variant),
            target_q,
        )?;
        let old = generator.target_q.set(variant, target_q);
        self.notify_update(id, "target_q", Some(variant), old.into(), target_q.into());
        Ok(())
    }

    pub fn set_generator_target_v(&mut self, id: &str, target_v: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let generator = self.generator_mut(id)?;
        check_voltage_regulation(
            &format!("Generator '{id}'"),
            *generator.voltage_regulator_on.get(variant),
            target_v,
            *generator.target_q.get(variant),
        )?;
        let old = generator.target_v.set(variant, target_v);
        self.notify_update(id, "target_v", Some(variant), old.into(), target_v.into());
        Ok(())
    }

    pub fn set_generator_voltage_regulator_on(&mut self, id: &str, on: bool) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let generator = self.generator_mut(id)?;
        check_voltage_regulation(
            &format!("Generator '{id}'"),
            on,
            *generator.target_v.get(variant),
            *generator.target_q.get(variant),
        )?;
        let old = generator.voltage_regulator_on.set(variant, on);
        self.notify_update(
            id,
            "voltage_regulator_on",
            Some(variant),
            old.into(),
            on.into(),
        );
        Ok(())
    }

    /// Moves the tap of the ratio tap changer of a two-winding transformer.
    pub fn set_tap_position(&mut self, transformer: &str, position: i32) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let rtc = self.ratio_tap_changer_mut(transformer)?;
        check_tap_position(
            &format!("2 windings transformer '{transformer}'"),
            position,
            rtc.low_tap_position(),
            rtc.high_tap_position(),
        )?;
        let old = rtc.tap_position.set(variant, position);
        self.notify_update(
            transformer,
            "tap_position",
            Some(variant),
            old.into(),
            position.into(),
        );
        Ok(())
    }

    pub fn set_tap_changer_regulating(
        &mut self,
        transformer: &str,
        regulating: bool,
    ) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let rtc = self.ratio_tap_changer_mut(transformer)?;
        if regulating && !rtc.has_load_tap_changing_capabilities() {
            return Err(Error::validation(format!(
                "2 windings transformer '{transformer}': a ratio tap changer without load tap \
                 changing capabilities cannot regulate"
            )));
        }
        let old = rtc.regulating.set(variant, regulating);
        self.notify_update(
            transformer,
            "regulating",
            Some(variant),
            old.into(),
            regulating.into(),
        );
        Ok(())
    }

    pub fn set_terminal_p(&mut self, terminal: TerminalId, p: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let old = self.terminal_mut(terminal)?.set_p(variant, p);
        let id = self
            .connectable_at(terminal.connectable())?
            .id()
            .to_string();
        self.notify_update(
            &id,
            &terminal_attribute("p", terminal),
            Some(variant),
            old.into(),
            p.into(),
        );
        Ok(())
    }

    pub fn set_terminal_q(&mut self, terminal: TerminalId, q: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let old = self.terminal_mut(terminal)?.set_q(variant, q);
        let id = self
            .connectable_at(terminal.connectable())?
            .id()
            .to_string();
        self.notify_update(
            &id,
            &terminal_attribute("q", terminal),
            Some(variant),
            old.into(),
            q.into(),
        );
        Ok(())
    }

    /// Maps a bus-breaker terminal to another configured bus of its voltage
    /// level, in the working variant.  The connection flag is kept.
    pub fn set_connectable_bus(&mut self, terminal: TerminalId, bus: &str) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let t = self.terminal(terminal)?;
        let vl_key = t.voltage_level();
        let Some(from) = t.connectable_bus(variant).map(str::to_string) else {
            return Err(Error::invalid_topology(format!(
                "Terminal {terminal:?} is not a bus/breaker terminal"
            )));
        };
        let owner = format!("Terminal {terminal:?}");
        let topology = self
            .voltage_level_mut(vl_key)?
            .topology
            .as_bus_breaker_mut()
            .ok_or_else(|| Error::internal(format!("{owner} is in a node/breaker voltage level")))?;
        topology.check_attach(&owner, bus)?;
        let change = topology.move_terminal(terminal, variant, &from, bus)?;
        self.terminal_mut(terminal)?
            .set_connectable_bus(variant, bus.to_string());
        self.propagate(vl_key, change);
        if change.is_changed() {
            let id = self
                .connectable_at(terminal.connectable())?
                .id()
                .to_string();
            self.notify_update(
                &id,
                &terminal_attribute("connectable_bus", terminal),
                Some(variant),
                from.into(),
                bus.to_string().into(),
            );
        }
        Ok(())
    }

    fn configured_bus_mut(&mut self, id: &str) -> Result<&mut ConfiguredBus, Error> {
        let Some(ElementRef::Bus(vl_key)) = self.index.get(id).cloned() else {
            return Err(Error::element_not_found(format!("Bus '{id}' not found")));
        };
        self.voltage_level_mut(vl_key)?
            .topology
            .as_bus_breaker_mut()
            .and_then(|t| t.bus_mut(id))
            .ok_or_else(|| Error::internal(format!("Bus '{id}' is indexed but missing")))
    }

    /// Sets the voltage magnitude of a configured bus.
    pub fn set_bus_v(&mut self, id: &str, v: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let old = self.configured_bus_mut(id)?.set_v(variant, v);
        self.notify_update(id, "v", Some(variant), old.into(), v.into());
        Ok(())
    }

    /// Sets the voltage angle of a configured bus.
    pub fn set_bus_angle(&mut self, id: &str, angle: f64) -> Result<(), Error> {
        let variant = self.working_variant()?;
        let old = self.configured_bus_mut(id)?.set_angle(variant, angle);
        self.notify_update(id, "angle", Some(variant), old.into(), angle.into());
        Ok(())
    }

    pub fn set_hvdc_active_power_setpoint(&mut self, id: &str, setpoint: f64) -> Result<(), Error> {
        let key = self.hvdc_line_key(id)?;
        let variant = self.working_variant()?;
        let line = self
            .hvdc_lines
            .get_mut(key)
            .ok_or_else(|| Error::internal(format!("HVDC line '{id}' is indexed but missing")))?;
        if !(setpoint.is_finite() && setpoint >= 0.0) {
            return Err(Error::validation(format!(
                "HVDC line '{id}': active power setpoint must be positive ({setpoint})"
            )));
        }
        let old = line.active_power_setpoint.set(variant, setpoint);
        self.notify_update(
            id,
            "active_power_setpoint",
            Some(variant),
            old.into(),
            setpoint.into(),
        );
        Ok(())
    }

    pub fn set_hvdc_converters_mode(
        &mut self,
        id: &str,
        mode: ConvertersMode,
    ) -> Result<(), Error> {
        let key = self.hvdc_line_key(id)?;
        let variant = self.working_variant()?;
        let line = self
            .hvdc_lines
            .get_mut(key)
            .ok_or_else(|| Error::internal(format!("HVDC line '{id}' is indexed but missing")))?;
        let old = line.converters_mode.set(variant, mode);
        self.notify_update(
            id,
            "converters_mode",
            Some(variant),
            AttributeValue::Text(format!("{old:?}")),
            AttributeValue::Text(format!("{mode:?}")),
        );
        Ok(())
    }

    /// Sets a property of an object and returns the previous value.
    pub fn set_property(
        &mut self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<String>, Error> {
        if !self.index.contains(id) {
            return Err(Error::element_not_found(format!("Object '{id}' not found")));
        }
        let old = self
            .properties
            .entry(id.to_string())
            .or_insert_with(IndexMap::new)
            .insert(key.to_string(), value.to_string());
        let attribute = format!("properties[{key}]");
        let new_value = AttributeValue::Text(value.to_string());
        match &old {
            Some(old) => {
                let old_value = AttributeValue::Text(old.clone());
                self.listeners.notify("property update", |l| {
                    l.on_element_replaced(id, &attribute, &old_value, &new_value)
                });
            }
            None => self.listeners.notify("property creation", |l| {
                l.on_element_added(id, &attribute, &new_value)
            }),
        }
        Ok(old)
    }

    pub fn property(&self, id: &str, key: &str) -> Option<&str> {
        self.properties
            .get(id)
            .and_then(|properties| properties.get(key))
            .map(String::as_str)
    }

    /// Returns the property names of an object, in insertion order.
    pub fn property_names(&self, id: &str) -> impl Iterator<Item = &str> {
        self.properties
            .get(id)
            .into_iter()
            .flat_map(|properties| properties.keys().map(String::as_str))
    }

    pub fn remove_property(&mut self, id: &str, key: &str) -> Option<String> {
        let old = self
            .properties
            .get_mut(id)
            .and_then(|properties| properties.shift_remove(key))?;
        let attribute = format!("properties[{key}]");
        let old_value = AttributeValue::Text(old.clone());
        self.listeners.notify("property removal", |l| {
            l.on_element_removed(id, &attribute, &old_value)
        });
        Some(old)
    }
}

/// Names a terminal attribute after the side of the terminal.
pub(super) fn terminal_attribute(attribute: &str, terminal: TerminalId) -> String {
    format!("{attribute}{}", terminal.position() + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        equipment::{
            GeneratorSpec, RatioTapChangerSpec, RatioTapChangerStep, TerminalSpec,
            TwoWindingsTransformerSpec,
        },
        network::test_utils::NetworkBuilder,
        variant::INITIAL_VARIANT_ID,
    };

    #[derive(Default)]
    struct UpdateLog(Arc<Mutex<Vec<String>>>);

    impl NetworkListener for UpdateLog {
        fn on_update(
            &self,
            id: &str,
            attribute: &str,
            variant_id: Option<&str>,
            old_value: &AttributeValue,
            new_value: &AttributeValue,
        ) {
            self.0.lock().unwrap().push(format!(
                "{id}.{attribute}@{}: {old_value:?} -> {new_value:?}",
                variant_id.unwrap_or("-")
            ));
        }

        fn on_element_added(&self, id: &str, attribute: &str, value: &AttributeValue) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{id}.{attribute} + {value:?}"));
        }

        fn on_element_replaced(
            &self,
            id: &str,
            attribute: &str,
            _old_value: &AttributeValue,
            new_value: &AttributeValue,
        ) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{id}.{attribute} = {new_value:?}"));
        }

        fn on_element_removed(&self, id: &str, attribute: &str, _old_value: &AttributeValue) {
            self.0.lock().unwrap().push(format!("{id}.{attribute} -"));
        }
    }

    #[test]
    fn test_updates_are_notified() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .node_breaker_level("VL")
            .switch("VL", "S", crate::SwitchKind::Breaker, (0, 1), false)
            .load("L", TerminalSpec::at_node("VL", 1))
            .build();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = network.add_listener(UpdateLog(log.clone()));
        network.clone_variant(INITIAL_VARIANT_ID, "V1")?;
        network.set_working_variant("V1")?;

        let terminal = network.connectable("L")?.terminals()[0].id();
        network.set_load_p0("L", 12.5)?;
        network.set_switch_open("S", true)?;
        // no change, no notification
        network.set_switch_open("S", true)?;
        network.set_load_p0("L", 12.5)?;
        network.set_terminal_p(terminal, f64::NAN)?;
        network.set_terminal_q(terminal, 3.0)?;
        network.set_terminal_q(terminal, 3.0)?;
        network.set_property("L", "owner", "tso")?;
        network.set_property("L", "owner", "dso")?;
        assert_eq!(
            network.remove_property("L", "owner"),
            Some("dso".to_string()),
        );
        assert!(network.remove_listener(listener));
        network.set_load_q0("L", 1.0)?;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "L.p0@V1: Float(0.0) -> Float(12.5)",
                "S.open@V1: Bool(false) -> Bool(true)",
                "L.q1@V1: Float(NaN) -> Float(3.0)",
                "L.properties[owner] + Text(\"tso\")",
                "L.properties[owner] = Text(\"dso\")",
                "L.properties[owner] -",
            ]
        );
        assert!(network.switch("S")?.is_open(1));
        assert!(!network.switch("S")?.is_open(0));
        Ok(())
    }

    #[test]
    fn test_setters_validate() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL")
            .bus("VL", "B1")
            .bus("VL", "B2")
            .build();
        network.add_generator(GeneratorSpec {
            id: "G".into(),
            terminal: TerminalSpec::at_bus("VL", "B1"),
            max_p: 100.0,
            target_v: 400.0,
            voltage_regulator_on: true,
            ..Default::default()
        })?;
        network.add_two_windings_transformer(TwoWindingsTransformerSpec {
            id: "T".into(),
            terminal1: TerminalSpec::at_bus("VL", "B1"),
            terminal2: TerminalSpec::at_bus("VL", "B2"),
            x: 1.0,
            rated_u1: 400.0,
            rated_u2: 400.0,
            ratio_tap_changer: Some(RatioTapChangerSpec {
                low_tap_position: 0,
                steps: vec![RatioTapChangerStep::default(); 3],
                tap_position: 1,
                load_tap_changing_capabilities: false,
                regulating: false,
                target_v: f64::NAN,
                regulation_terminal: None,
            }),
            ..Default::default()
        })?;

        assert_eq!(
            network.set_load_p0("G", 1.0),
            Err(Error::element_not_found("Load 'G' not found"))
        );
        assert_eq!(
            network.set_generator_target_v("G", -1.0),
            Err(Error::validation(
                "Generator 'G': voltage setpoint must be strictly positive (-1)"
            ))
        );
        assert_eq!(
            network.set_tap_position("T", 3),
            Err(Error::validation(
                "2 windings transformer 'T': incorrect tap position 3 [0, 2]"
            ))
        );
        network.set_tap_position("T", 2)?;
        let rtc = network
            .two_windings_transformer("T")?
            .ratio_tap_changer()
            .unwrap();
        assert_eq!(rtc.tap_position(0), 2);
        assert!(network.set_tap_changer_regulating("T", true).is_err());
        assert_eq!(
            network.set_property("X", "k", "v"),
            Err(Error::element_not_found("Object 'X' not found"))
        );
        Ok(())
    }

    #[test]
    fn test_set_connectable_bus() -> Result<(), Error> {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL")
            .bus("VL", "B1")
            .bus("VL", "B2")
            .load("L", TerminalSpec::at_bus("VL", "B1"))
            .build();
        let terminal = network.connectable("L")?.terminals()[0].id();
        network.clone_variant(INITIAL_VARIANT_ID, "V1")?;
        network.set_working_variant("V1")?;

        network.set_connectable_bus(terminal, "B2")?;
        assert_eq!(network.terminal(terminal)?.connectable_bus(1), Some("B2"));
        assert_eq!(network.terminal(terminal)?.connectable_bus(0), Some("B1"));
        assert_eq!(network.configured_bus("B2")?.terminals(1), &[terminal]);
        assert!(network.configured_bus("B1")?.terminals(1).is_empty());
        assert_eq!(
            network
                .terminal_bus_breaker_bus(terminal)?
                .map(|b| b.id().to_string()),
            Some("B2".to_string())
        );
        assert_eq!(
            network.set_connectable_bus(terminal, "B3"),
            Err(Error::validation(format!(
                "Terminal {terminal:?}: bus 'B3' not found in voltage level 'VL'"
            )))
        );
        Ok(())
    }
}
