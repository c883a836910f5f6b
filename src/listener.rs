// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Change notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::IdentifiableType;

/// The value of an attribute, as reported to listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Float(f64),
    Integer(i64),
    Text(String),
    None,
}

impl AttributeValue {
    /// Like `==`, except that two NaN floats are the same value.
    pub(crate) fn is_same(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Float(a), AttributeValue::Float(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            _ => self == other,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(value.into())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::None, Into::into)
    }
}

/**
This trait is implemented by observers of a network.

All methods have empty default implementations, so implementors only
override the notifications they care about.  Notifications are delivered
synchronously, on the mutating thread, in the order the listeners were
added.

A listener that panics does not abort the mutation it is notified about.
The panic is caught and logged, and the remaining listeners are still
notified.
*/
pub trait NetworkListener {
    /// Called after an object was added to the network.
    fn on_creation(&self, _id: &str, _kind: IdentifiableType) {}

    /// Called after an attribute of an object changed.  `variant_id` is set
    /// for variant-dependent attributes.
    fn on_update(
        &self,
        _id: &str,
        _attribute: &str,
        _variant_id: Option<&str>,
        _old_value: &AttributeValue,
        _new_value: &AttributeValue,
    ) {
    }

    /// Called after an entry was added to a collection-valued attribute.
    fn on_element_added(&self, _id: &str, _attribute: &str, _value: &AttributeValue) {}

    /// Called after an entry of a collection-valued attribute was replaced.
    fn on_element_replaced(
        &self,
        _id: &str,
        _attribute: &str,
        _old_value: &AttributeValue,
        _new_value: &AttributeValue,
    ) {
    }

    /// Called after an entry was removed from a collection-valued attribute.
    fn on_element_removed(&self, _id: &str, _attribute: &str, _old_value: &AttributeValue) {}

    /// Called before an object is removed from the network.
    fn before_removal(&self, _id: &str, _kind: IdentifiableType) {}

    /// Called after an object was removed from the network.
    fn after_removal(&self, _id: &str) {}

    fn on_variant_created(&self, _source_variant_id: &str, _target_variant_id: &str) {}

    fn on_variant_overwritten(&self, _source_variant_id: &str, _target_variant_id: &str) {}

    fn on_variant_removed(&self, _variant_id: &str) {}
}

/// Handle returned when a listener is added, used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type BoxedListener = Box<dyn NetworkListener + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
    listeners: Vec<(ListenerId, BoxedListener)>,
    next_id: u64,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: BoxedListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<BoxedListener> {
        let position = self.listeners.iter().position(|(l, _)| *l == id)?;
        Some(self.listeners.remove(position).1)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Calls `notification` on every listener, in registration order.
    pub(crate) fn notify(&self, event: &str, notification: impl Fn(&dyn NetworkListener)) {
        for (id, listener) in &self.listeners {
            let result = catch_unwind(AssertUnwindSafe(|| notification(listener.as_ref())));
            if result.is_err() {
                tracing::error!("Listener {:?} panicked while handling {event}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl NetworkListener for Recorder {
        fn on_creation(&self, id: &str, _kind: IdentifiableType) {
            self.log.lock().unwrap().push(format!("{}:{id}", self.name));
        }
    }

    struct Panicking;

    impl NetworkListener for Panicking {
        fn on_creation(&self, _id: &str, _kind: IdentifiableType) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_dispatch_survives_panics() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        listeners.add(Box::new(Recorder {
            name: "a",
            log: log.clone(),
        }));
        let panicking = listeners.add(Box::new(Panicking));
        listeners.add(Box::new(Recorder {
            name: "b",
            log: log.clone(),
        }));

        listeners.notify("creation", |l| l.on_creation("L1", IdentifiableType::Load));
        assert_eq!(*log.lock().unwrap(), vec!["a:L1", "b:L1"]);

        assert!(listeners.remove(panicking).is_some());
        assert!(listeners.remove(panicking).is_none());
        listeners.notify("creation", |l| l.on_creation("L2", IdentifiableType::Load));
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_attribute_value_conversions() {
        assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
        assert_eq!(AttributeValue::from(3), AttributeValue::Integer(3));
        assert_eq!(AttributeValue::from(None::<f64>), AttributeValue::None);
        assert_eq!(
            AttributeValue::from(Some("B1".to_string())),
            AttributeValue::Text("B1".into())
        );
    }
}
