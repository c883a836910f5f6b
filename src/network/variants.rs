// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Variant management on a [`Network`].

use std::any::Any;

use super::Network;
use crate::{
    variant::{CloneOutcome, MultiVariantObject, VariantManager, VariantOp},
    Error,
};

/// An external object with variant-dependent state, resized together with
/// the equipment of the network it is registered on.
pub trait VariantExtension: MultiVariantObject + Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implement `VariantExtension` for every suitable `MultiVariantObject`.
impl<T: MultiVariantObject + Any + Send + Sync> VariantExtension for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Network {
    pub fn variant_manager(&self) -> &VariantManager {
        &self.variants
    }

    /// Makes the given variant the working variant of the caller.
    pub fn set_working_variant(&self, variant_id: &str) -> Result<(), Error> {
        self.variants.set_working_variant(variant_id)
    }

    pub fn allow_variant_multi_thread_access(&mut self, allow: bool) {
        self.variants.allow_variant_multi_thread_access(allow);
    }

    /// Creates the variant `target_id` as a copy of `source_id`.
    pub fn clone_variant(&mut self, source_id: &str, target_id: &str) -> Result<(), Error> {
        self.clone_variants(source_id, &[target_id], false)
    }

    /// Copies `source_id` into each of `target_ids`.
    ///
    /// Existing targets are overwritten if `may_overwrite` is set, and make
    /// the call fail otherwise.  Nothing changes if the call fails.
    pub fn clone_variants(
        &mut self,
        source_id: &str,
        target_ids: &[&str],
        may_overwrite: bool,
    ) -> Result<(), Error> {
        let targets = target_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>();
        let (ops, outcomes) = self.variants.plan_clone(source_id, &targets, may_overwrite)?;
        for op in &ops {
            self.apply_variant_op(op);
        }
        for outcome in outcomes {
            match outcome {
                CloneOutcome::Created { target } => {
                    tracing::debug!("Created variant '{target}' from '{source_id}'");
                    self.listeners.notify("variant creation", |l| {
                        l.on_variant_created(source_id, &target)
                    });
                }
                CloneOutcome::Overwritten { target } => {
                    tracing::debug!("Overwrote variant '{target}' with '{source_id}'");
                    self.listeners.notify("variant overwrite", |l| {
                        l.on_variant_overwritten(source_id, &target)
                    });
                }
            }
        }
        Ok(())
    }

    /// Removes a variant and frees its slot.
    ///
    /// If the variant was the working variant of the caller, the caller has
    /// no working variant afterwards.
    pub fn remove_variant(&mut self, variant_id: &str) -> Result<(), Error> {
        let ops = self.variants.plan_remove(variant_id)?;
        for op in &ops {
            self.apply_variant_op(op);
        }
        tracing::debug!("Removed variant '{variant_id}'");
        self.listeners
            .notify("variant removal", |l| l.on_variant_removed(variant_id));
        Ok(())
    }

    fn apply_variant_op(&mut self, op: &VariantOp) {
        tracing::debug!(
            "Resizing variant arrays: {op:?} (size: {})",
            self.variants.variant_array_size()
        );
        for vl in self.voltage_levels.values_mut() {
            vl.apply_variant_op(op);
        }
        for connectable in self.connectables.values_mut() {
            connectable.apply_variant_op(op);
        }
        for line in self.hvdc_lines.values_mut() {
            line.apply_variant_op(op);
        }
        self.components.apply_variant_op(op);
        for extension in self.extensions.values_mut() {
            extension.apply_variant_op(op);
        }
    }

    /// Registers an extension under `name`.
    ///
    /// The extension must have one slot per allocated variant, which
    /// [`VariantManager::variant_array_size`] tells.  Extensions of any
    /// other size are rejected.
    pub fn add_variant_extension(
        &mut self,
        name: &str,
        extension: impl VariantExtension,
    ) -> Result<(), Error> {
        if self.extensions.contains_key(name) {
            return Err(Error::duplicate_id(format!(
                "The network already has an extension '{name}'"
            )));
        }
        let expected = self.variants.variant_array_size();
        if let Some(size) = extension.variant_array_size() {
            if size != expected {
                return Err(Error::invalid_variant(format!(
                    "Extension '{name}' has {size} variant slots instead of {expected}"
                )));
            }
        }
        self.extensions
            .insert(name.to_string(), Box::new(extension));
        Ok(())
    }

    pub fn variant_extension<T: VariantExtension>(&self, name: &str) -> Option<&T> {
        self.extensions
            .get(name)
            .and_then(|extension| extension.as_any().downcast_ref())
    }

    pub fn variant_extension_mut<T: VariantExtension>(&mut self, name: &str) -> Option<&mut T> {
        self.extensions
            .get_mut(name)
            .and_then(|extension| extension.as_any_mut().downcast_mut())
    }

    pub fn remove_variant_extension(&mut self, name: &str) -> bool {
        self.extensions.shift_remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{
        equipment::{LoadSpec, TerminalSpec},
        listener::NetworkListener,
        network::test_utils::{load_spec, NetworkBuilder},
        variant::{MultiVariantObject, VariantArray, VariantOp, INITIAL_VARIANT_ID},
        Error, Network,
    };

    struct Forecast {
        values: VariantArray<f64>,
    }

    impl MultiVariantObject for Forecast {
        fn apply_variant_op(&mut self, op: &VariantOp) {
            self.values.apply_variant_op(op);
        }

        fn variant_array_size(&self) -> Option<usize> {
            self.values.variant_array_size()
        }
    }

    fn network() -> Network {
        let mut network = NetworkBuilder::new()
            .bus_breaker_level("VL")
            .bus("VL", "B1")
            .build();
        network
            .add_load(LoadSpec {
                p0: 10.0,
                ..load_spec("L", TerminalSpec::at_bus("VL", "B1"))
            })
            .unwrap();
        network
    }

    #[test]
    fn test_variant_arrays_move_in_lock_step() -> Result<(), Error> {
        let mut network = network();
        network.add_variant_extension(
            "forecast",
            Forecast {
                values: VariantArray::new(1, 5.0),
            },
        )?;

        network.clone_variants(INITIAL_VARIANT_ID, &["V1", "V2"], false)?;
        assert_eq!(network.variant_manager().variant_array_size(), 3);
        let forecast = network.variant_extension::<Forecast>("forecast").unwrap();
        assert_eq!(forecast.values.len(), 3);
        assert_eq!(*forecast.values.get(2), 5.0);
        assert_eq!(network.load("L")?.p0(2), 10.0);

        // each variant keeps its own value
        network.set_working_variant("V1")?;
        network.set_load_p0("L", 20.0)?;
        assert_eq!(network.load("L")?.p0(0), 10.0);
        assert_eq!(network.load("L")?.p0(1), 20.0);

        // a removed slot is reused by the next clone, copied from its source
        network.remove_variant("V1")?;
        assert_eq!(network.variant_manager().working_variant_index().ok(), None);
        network.clone_variant("V2", "V3")?;
        assert_eq!(network.variant_manager().variant_index("V3")?, 1);
        assert_eq!(network.variant_manager().variant_array_size(), 3);
        assert_eq!(network.load("L")?.p0(1), 10.0);

        network.remove_variant("V2")?;
        network.remove_variant("V3")?;
        assert_eq!(network.variant_manager().variant_array_size(), 1);
        let forecast = network.variant_extension::<Forecast>("forecast").unwrap();
        assert_eq!(forecast.values.len(), 1);
        Ok(())
    }

    #[test]
    fn test_extension_size_must_match_variants() -> Result<(), Error> {
        let mut network = network();
        network.clone_variant(INITIAL_VARIANT_ID, "V1")?;
        assert_eq!(
            network.add_variant_extension(
                "forecast",
                Forecast {
                    values: VariantArray::new(1, 5.0),
                },
            ),
            Err(Error::invalid_variant(
                "Extension 'forecast' has 1 variant slots instead of 2"
            ))
        );
        assert!(network.variant_extension::<Forecast>("forecast").is_none());

        // the network still resizes cleanly, and a matching extension follows
        network.clone_variant("V1", "V2")?;
        network.add_variant_extension(
            "forecast",
            Forecast {
                values: VariantArray::new(3, 5.0),
            },
        )?;
        network.clone_variant("V2", "V3")?;
        let forecast = network.variant_extension::<Forecast>("forecast").unwrap();
        assert_eq!(forecast.values.len(), 4);
        assert_eq!(network.load("L")?.p0(3), 10.0);
        Ok(())
    }

    #[test]
    fn test_variant_errors_change_nothing() -> Result<(), Error> {
        let mut network = network();
        network.clone_variant(INITIAL_VARIANT_ID, "V1")?;
        assert_eq!(
            network.clone_variants(INITIAL_VARIANT_ID, &["V2", "V1"], false),
            Err(Error::invalid_variant("Target variant 'V1' already exists"))
        );
        assert!(network.variant_manager().variant_index("V2").is_err());
        assert_eq!(
            network.remove_variant(INITIAL_VARIANT_ID),
            Err(Error::invalid_variant("Removing initial variant is forbidden"))
        );
        assert_eq!(
            network.set_working_variant("V9"),
            Err(Error::invalid_variant("Variant 'V9' not found"))
        );
        Ok(())
    }

    struct VariantLog(Arc<Mutex<Vec<String>>>);

    impl NetworkListener for VariantLog {
        fn on_variant_created(&self, source: &str, target: &str) {
            self.0
                .lock()
                .unwrap()
                .push(format!("created {source}->{target}"));
        }

        fn on_variant_overwritten(&self, source: &str, target: &str) {
            self.0
                .lock()
                .unwrap()
                .push(format!("overwritten {source}->{target}"));
        }

        fn on_variant_removed(&self, id: &str) {
            self.0.lock().unwrap().push(format!("removed {id}"));
        }
    }

    #[test]
    fn test_variant_notifications() -> Result<(), Error> {
        let mut network = network();
        let log = Arc::new(Mutex::new(Vec::new()));
        network.add_listener(VariantLog(log.clone()));

        network.clone_variant(INITIAL_VARIANT_ID, "V1")?;
        network.set_working_variant("V1")?;
        network.set_load_p0("L", 30.0)?;
        network.clone_variants("V1", &[INITIAL_VARIANT_ID], true)?;
        assert_eq!(network.load("L")?.p0(0), 30.0);
        network.remove_variant("V1")?;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "created InitialState->V1",
                "overwritten V1->InitialState",
                "removed V1",
            ]
        );
        Ok(())
    }
}
